//! Read-only command handlers. Reads never modify metadata; atime moves
//! only through explicit commands.

use std::mem;

use tracing::debug;

use crate::error::{FsError, Result};
use crate::node::{Body, Node, PERM_MASK};
use crate::volume::Volume;

use super::{arg_u64, expect_args, is_keyword, lossy, Reply};

/// FS.CAT path — full payload of a file, following symlinks.
pub fn cat(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 1)?;
    debug!("cat(path={})", lossy(args[0]));
    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at(&comps).ok_or(FsError::NoEntry)?;
    match &node.body {
        Body::File { data, .. } => Ok(Reply::Bulk(data.clone())),
        Body::Dir(_) => Err(FsError::IsDir),
        // Unreachable: the final symlink was followed.
        Body::Symlink { .. } => Err(FsError::NoEntry),
    }
}

/// FS.LS path [LONG] — entry names in ascending byte order. LONG widens
/// each entry to (name, type, mode_octal, size, mtime_ms).
pub fn ls(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 2)?;
    let long = match args.get(1) {
        Some(flag) if is_keyword(flag, "LONG") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    debug!("ls(path={}, long={})", lossy(args[0]), long);

    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at(&comps).ok_or(FsError::NoEntry)?;
    let entries = node.entries().ok_or(FsError::NotDir)?;

    let items = entries
        .iter()
        .map(|(name, child)| {
            if long {
                Reply::Array(vec![
                    Reply::Bulk(name.clone()),
                    Reply::bulk(child.kind().as_str()),
                    Reply::bulk(format!("{:o}", child.meta.mode & PERM_MASK)),
                    Reply::Int(child.size() as i64),
                    Reply::Int(child.meta.mtime_ms as i64),
                ])
            } else {
                Reply::Bulk(name.clone())
            }
        })
        .collect();
    Ok(Reply::Array(items))
}

/// FS.STAT path — metadata as key/value pairs. lstat semantics: the final
/// symlink is not followed, and `target` is present only for symlinks.
pub fn stat(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 1)?;
    debug!("stat(path={})", lossy(args[0]));

    let comps = vol.resolve(args[0], false)?;
    let node = vol.node_at(&comps).ok_or(FsError::NoEntry)?;
    let meta = node.meta;
    let mut pairs = vec![
        Reply::bulk("type"),
        Reply::bulk(node.kind().as_str()),
        Reply::bulk("mode"),
        Reply::Int(meta.mode as i64),
        Reply::bulk("uid"),
        Reply::Int(meta.uid as i64),
        Reply::bulk("gid"),
        Reply::Int(meta.gid as i64),
        Reply::bulk("size"),
        Reply::Int(node.size() as i64),
        Reply::bulk("atime_ms"),
        Reply::Int(meta.atime_ms as i64),
        Reply::bulk("mtime_ms"),
        Reply::Int(meta.mtime_ms as i64),
        Reply::bulk("ctime_ms"),
        Reply::Int(meta.ctime_ms as i64),
    ];
    if let Body::Symlink { target } = &node.body {
        pairs.push(Reply::bulk("target"));
        pairs.push(Reply::Bulk(target.clone()));
    }
    Ok(Reply::Array(pairs))
}

/// FS.TEST path — 1 if the path resolves with the final symlink followed,
/// 0 otherwise. Resolution failures never surface as errors.
pub fn test(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 1)?;
    let ok = vol.resolve(args[0], true).is_ok();
    debug!("test(path={}) -> {}", lossy(args[0]), ok as i64);
    Ok(Reply::Int(ok as i64))
}

/// FS.READLINK path — the link's target string, verbatim.
pub fn readlink(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 1)?;
    debug!("readlink(path={})", lossy(args[0]));
    let comps = vol.resolve(args[0], false)?;
    match &vol.node_at(&comps).ok_or(FsError::NoEntry)?.body {
        Body::Symlink { target } => Ok(Reply::Bulk(target.clone())),
        _ => Err(FsError::NotLink),
    }
}

/// FS.TREE path [DEPTH n] — nested arrays: a directory renders as
/// [name, [children…]], every other node as its bare name. DEPTH bounds
/// the walk (1 = immediate children); the default is unbounded.
pub fn tree(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 1, 3)?;
    let depth = match args.get(1) {
        None => None,
        Some(kw) if is_keyword(kw, "DEPTH") => {
            let raw = args.get(2).ok_or(FsError::Arity)?;
            Some(arg_u64(raw)?)
        }
        Some(_) => return Err(FsError::Invalid),
    };
    debug!("tree(path={}, depth={:?})", lossy(args[0]), depth);

    let comps = vol.resolve(args[0], true)?;
    let node = vol.node_at(&comps).ok_or(FsError::NoEntry)?;
    let name = comps.last().cloned().unwrap_or_else(|| b"/".to_vec());
    Ok(render_tree(node, name, depth))
}

struct TreeFrame<'a> {
    name: Vec<u8>,
    src: std::collections::btree_map::Iter<'a, Vec<u8>, Node>,
    built: Vec<Reply>,
}

/// Iterative render; directories may nest arbitrarily deep.
fn render_tree(root: &Node, root_name: Vec<u8>, depth: Option<u64>) -> Reply {
    let entries = match root.entries() {
        Some(entries) if depth != Some(0) => entries,
        _ => return Reply::Bulk(root_name),
    };

    let mut parents: Vec<TreeFrame> = Vec::new();
    let mut current = TreeFrame {
        name: root_name,
        src: entries.iter(),
        built: Vec::new(),
    };

    loop {
        if let Some((name, child)) = current.src.next() {
            // A directory child expands only while within the depth bound;
            // the current frame sits at level parents.len().
            match child.entries() {
                Some(child_entries)
                    if depth.map_or(true, |d| (parents.len() as u64) + 1 < d) =>
                {
                    let frame = TreeFrame {
                        name: name.clone(),
                        src: child_entries.iter(),
                        built: Vec::new(),
                    };
                    parents.push(mem::replace(&mut current, frame));
                }
                _ => current.built.push(Reply::Bulk(name.clone())),
            }
            continue;
        }

        let TreeFrame {
            name,
            built,
            src: _,
        } = current;
        let reply = Reply::Array(vec![Reply::Bulk(name), Reply::Array(built)]);
        match parents.pop() {
            Some(mut parent) => {
                parent.built.push(reply);
                current = parent;
            }
            None => return reply,
        }
    }
}

/// FS.INFO — volume-wide counters as key/value pairs.
pub fn info(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 0, 0)?;
    let stats = vol.stats();
    debug!(
        "info(files={}, directories={}, symlinks={}, total_bytes={})",
        stats.files, stats.directories, stats.symlinks, stats.total_bytes
    );
    Ok(Reply::Array(vec![
        Reply::bulk("files"),
        Reply::Int(stats.files as i64),
        Reply::bulk("directories"),
        Reply::Int(stats.directories as i64),
        Reply::bulk("symlinks"),
        Reply::Int(stats.symlinks as i64),
        Reply::bulk("total_bytes"),
        Reply::Int(stats.total_bytes as i64),
    ]))
}
