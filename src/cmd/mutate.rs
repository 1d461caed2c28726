//! Mutating command handlers. Each handler validates fully before the
//! first observable change; recursive operations build or detach subtrees
//! off to the side and commit with a single map insert, so a failing
//! command never half-applies.

use std::collections::btree_map::Entry;

use tracing::debug;

use crate::error::{FsError, Result};
use crate::node::{bloom::TokenFilter, Body, Node, NodeKind, PERM_MASK, S_IFMT};
use crate::path;
use crate::volume::resolve::MAX_SYMLINK_HOPS;
use crate::volume::{now_ms, Volume};

use super::{arg_str, arg_u32, arg_u64, expect_args, is_keyword, lossy, Reply};

/// FS.ECHO path data [APPEND] — write (or append to) a file, creating
/// missing parent directories. Replies with the number of bytes written.
pub fn echo(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 3)?;
    let append = match args.get(2) {
        Some(flag) if is_keyword(flag, "APPEND") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    write_file(vol, args[0], args[1], append)
}

/// FS.APPEND path data — alias for `ECHO path data APPEND`.
pub fn append(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 2)?;
    write_file(vol, args[0], args[1], true)
}

fn write_file(vol: &mut Volume, raw: &[u8], data: &[u8], append: bool) -> Result<Reply> {
    debug!(
        "echo(path={}, bytes={}, append={})",
        lossy(raw),
        data.len(),
        append
    );
    let (parent, name) = resolve_file_slot(vol, raw)?;
    let now = now_ms();
    let entries = vol.entries_at_mut(&parent)?;
    match entries.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(Node::new_file(data.to_vec(), now));
        }
        Entry::Occupied(mut slot) => {
            let node = slot.get_mut();
            match &mut node.body {
                Body::File {
                    data: payload,
                    bloom,
                } => {
                    if append {
                        payload.extend_from_slice(data);
                    } else {
                        *payload = data.to_vec();
                    }
                    // Rebuilt from the full payload, append included.
                    *bloom = TokenFilter::build(payload);
                }
                // resolve_file_slot only admits empty slots and regular files.
                _ => return Err(FsError::IsDir),
            }
            node.meta.mtime_ms = now;
            node.meta.ctime_ms = now;
        }
    }
    Ok(Reply::Int(data.len() as i64))
}

/// FS.TOUCH path — create an empty file (parents included) or bump an
/// existing node's times to now. Follows a final symlink.
pub fn touch(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 1)?;
    let raw = args[0];
    debug!("touch(path={})", lossy(raw));
    let now = now_ms();
    match vol.resolve(raw, true) {
        Ok(comps) => {
            let node = vol.node_at_mut(&comps).ok_or(FsError::NoEntry)?;
            node.meta.atime_ms = now;
            node.meta.mtime_ms = now;
            node.meta.ctime_ms = now;
        }
        Err(FsError::NoEntry) => {
            let (parent, name) = resolve_file_slot(vol, raw)?;
            let entries = vol.entries_at_mut(&parent)?;
            if !entries.contains_key(&name) {
                entries.insert(name, Node::new_file(Vec::new(), now));
            }
        }
        Err(err) => return Err(err),
    }
    Ok(Reply::Int(1))
}

/// FS.MKDIR path [PARENTS] — without PARENTS the parent must exist; with
/// it every missing ancestor is created and an existing directory is a
/// success, but any non-directory component fails.
pub fn mkdir(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 2)?;
    let parents = match args.get(1) {
        Some(flag) if is_keyword(flag, "PARENTS") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    let raw = args[0];
    debug!("mkdir(path={}, parents={})", lossy(raw), parents);

    if parents {
        let comps = path::parse(raw)?;
        if comps.is_empty() {
            return Err(FsError::Invalid);
        }
        let mut hops = 0u32;
        vol.walk_create(comps, FsError::Exists, &mut hops)?;
    } else {
        let (parent, name) = vol.resolve_parent(raw)?;
        let entries = vol.entries_at_mut(&parent)?;
        if entries.contains_key(&name) {
            return Err(FsError::Exists);
        }
        entries.insert(name, Node::new_dir(now_ms()));
    }
    Ok(Reply::Int(1))
}

/// FS.RM path [RECURSIVE] — remove a node; a symlink is removed itself,
/// never its target. Replies with the number of nodes removed.
pub fn rm(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 2)?;
    let recursive = match args.get(1) {
        Some(flag) if is_keyword(flag, "RECURSIVE") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    let raw = args[0];
    debug!("rm(path={}, recursive={})", lossy(raw), recursive);

    let (parent, name) = vol.resolve_parent(raw)?;
    let entries = vol.entries_at_mut(&parent)?;
    let node = entries.get(&name).ok_or(FsError::NoEntry)?;
    if let Body::Dir(children) = &node.body {
        if !children.is_empty() && !recursive {
            return Err(FsError::NotEmpty);
        }
    }
    let count = node.count_nodes();
    entries.remove(&name);
    Ok(Reply::Int(count as i64))
}

/// FS.CP src dst [RECURSIVE] — deep copy with metadata; blooms are
/// rebuilt from the copied payloads. Replies with the number of nodes
/// copied.
pub fn cp(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 3)?;
    let recursive = match args.get(2) {
        Some(flag) if is_keyword(flag, "RECURSIVE") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    let (src_raw, dst_raw) = (args[0], args[1]);
    debug!(
        "cp(src={}, dst={}, recursive={})",
        lossy(src_raw),
        lossy(dst_raw),
        recursive
    );

    let src = vol.resolve(src_raw, false)?;
    {
        let node = vol.node_at(&src).ok_or(FsError::NoEntry)?;
        if node.is_dir() && !recursive {
            return Err(FsError::IsDir);
        }
    }

    let (dst_parent, dst_name) = destination_slot(vol, &src, dst_raw, false)?;

    let mut dst_chain = dst_parent.clone();
    dst_chain.push(dst_name.clone());
    if src == dst_chain {
        return Ok(Reply::Int(0));
    }

    if let Some(existing) = vol.entries_at(&dst_parent)?.get(&dst_name) {
        if let Body::Dir(children) = &existing.body {
            if !children.is_empty() {
                return Err(FsError::NotEmpty);
            }
        }
    }

    let (copy, count) = {
        let node = vol.node_at(&src).ok_or(FsError::NoEntry)?;
        node.deep_copy(now_ms())
    };
    vol.entries_at_mut(&dst_parent)?.insert(dst_name, copy);
    Ok(Reply::Int(count as i64))
}

/// FS.MV src dst — rename within the volume: an atomic detach from the
/// old parent and attach to the new one.
pub fn mv(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 2)?;
    let (src_raw, dst_raw) = (args[0], args[1]);
    debug!("mv(src={}, dst={})", lossy(src_raw), lossy(dst_raw));

    let src = vol.resolve(src_raw, false)?;
    if src.is_empty() {
        // The root cannot move.
        return Err(FsError::Invalid);
    }
    let src_kind = vol.node_at(&src).ok_or(FsError::NoEntry)?.kind();

    let (dst_parent, dst_name) = destination_slot(vol, &src, dst_raw, true)?;

    let mut dst_chain = dst_parent.clone();
    dst_chain.push(dst_name.clone());
    if src == dst_chain {
        return Ok(Reply::Int(1));
    }

    // A directory cannot move into its own subtree.
    if src_kind == NodeKind::Dir && dst_parent.len() >= src.len() && dst_parent[..src.len()] == src
    {
        return Err(FsError::Invalid);
    }

    // Only file-over-file replacement is allowed at an occupied slot.
    if let Some(existing) = vol.entries_at(&dst_parent)?.get(&dst_name) {
        if src_kind != NodeKind::File || existing.kind() != NodeKind::File {
            return Err(FsError::Exists);
        }
    }

    // Everything is validated: detach, then attach. The destination map
    // was just looked up, so the insert cannot fail.
    let src_parent = &src[..src.len() - 1];
    let src_name = &src[src.len() - 1];
    let mut node = vol
        .entries_at_mut(src_parent)?
        .remove(src_name)
        .ok_or(FsError::NoEntry)?;
    node.meta.ctime_ms = now_ms();
    vol.entries_at_mut(&dst_parent)?.insert(dst_name, node);
    Ok(Reply::Int(1))
}

/// FS.CHMOD path mode — mode is an octal string; only the low 12 bits
/// are retained and the type nibble is preserved. Follows symlinks.
pub fn chmod(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 2)?;
    let mode = u16::from_str_radix(arg_str(args[1])?, 8).map_err(|_| FsError::Invalid)?;
    debug!("chmod(path={}, mode={:o})", lossy(args[0]), mode);

    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at_mut(&comps).ok_or(FsError::NoEntry)?;
    node.meta.mode = (node.meta.mode & S_IFMT) | (mode & PERM_MASK);
    node.meta.ctime_ms = now_ms();
    Ok(Reply::Int(1))
}

/// FS.CHOWN path uid gid — follows symlinks.
pub fn chown(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 3, 3)?;
    let uid = arg_u32(args[1])?;
    let gid = arg_u32(args[2])?;
    debug!("chown(path={}, uid={}, gid={})", lossy(args[0]), uid, gid);

    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at_mut(&comps).ok_or(FsError::NoEntry)?;
    node.meta.uid = uid;
    node.meta.gid = gid;
    node.meta.ctime_ms = now_ms();
    Ok(Reply::Int(1))
}

/// FS.LN target link — create a symbolic link at `link`. The target is
/// stored verbatim, may dangle, and must fit the persisted u16 length.
pub fn ln(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 2)?;
    let target = args[0];
    debug!("ln(target={}, link={})", lossy(target), lossy(args[1]));
    if target.len() > u16::MAX as usize {
        return Err(FsError::Invalid);
    }

    let (parent, name) = vol.resolve_parent(args[1])?;
    let entries = vol.entries_at_mut(&parent)?;
    if entries.contains_key(&name) {
        return Err(FsError::Exists);
    }
    entries.insert(name, Node::new_symlink(target.to_vec(), now_ms()));
    Ok(Reply::Int(1))
}

/// FS.UTIMENS path atime_ms mtime_ms — set timestamps explicitly. ctime
/// is pinned to the supplied mtime so replicated trees serialize
/// identically.
pub fn utimens(vol: &mut Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 3, 3)?;
    let atime_ms = arg_u64(args[1])?;
    let mtime_ms = arg_u64(args[2])?;
    debug!(
        "utimens(path={}, atime_ms={}, mtime_ms={})",
        lossy(args[0]),
        atime_ms,
        mtime_ms
    );

    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at_mut(&comps).ok_or(FsError::NoEntry)?;
    node.meta.atime_ms = atime_ms;
    node.meta.mtime_ms = mtime_ms;
    node.meta.ctime_ms = mtime_ms;
    Ok(Reply::Int(1))
}

/// Resolve a write target for ECHO/TOUCH: create missing parents and
/// follow a final symlink chain, hop-budgeted like the resolver. On
/// success the slot is either empty or holds a regular file.
fn resolve_file_slot(vol: &mut Volume, raw: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let mut hops = 0u32;
    let mut current = raw.to_vec();
    loop {
        let mut comps = path::parse(&current)?;
        let name = comps.pop().ok_or(FsError::Invalid)?;
        let parent = vol.walk_create(comps, FsError::NotDir, &mut hops)?;

        let link = match vol.entries_at(&parent)?.get(&name) {
            None => None,
            Some(node) => match &node.body {
                Body::File { .. } => None,
                Body::Dir(_) => return Err(FsError::IsDir),
                Body::Symlink { target } => Some(target.clone()),
            },
        };
        match link {
            None => return Ok((parent, name)),
            Some(target) => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(FsError::Loop);
                }
                if target.is_empty() {
                    return Err(FsError::NoEntry);
                }
                current = if target[0] == b'/' {
                    target
                } else {
                    path::child(&path::join(&parent), &target)
                };
            }
        }
    }
}

/// Destination slot for CP and MV: an existing directory receives the
/// source under its basename, anything else names the destination
/// itself, and a missing final component resolves against its parent.
/// MV inspects the link node itself; CP follows a final symlink.
fn destination_slot(
    vol: &Volume,
    src: &[Vec<u8>],
    dst_raw: &[u8],
    link_itself: bool,
) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    match vol.resolve(dst_raw, !link_itself) {
        Ok(comps) => {
            let node = vol.node_at(&comps).ok_or(FsError::NoEntry)?;
            if node.is_dir() {
                // Copying or moving the root into a directory has no
                // basename to reuse.
                let name = src.last().cloned().ok_or(FsError::Invalid)?;
                Ok((comps, name))
            } else {
                let mut parent = comps;
                let name = parent.pop().ok_or(FsError::Invalid)?;
                Ok((parent, name))
            }
        }
        Err(FsError::NoEntry) => vol.resolve_parent(dst_raw),
        Err(err) => Err(err),
    }
}
