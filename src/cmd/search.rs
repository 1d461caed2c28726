//! FIND and GREP: subtree walks with glob matching. Both walk depth-first
//! with an explicit stack, children in ascending byte order, and neither
//! traverses symlinks — a link is enumerated as itself, never its target.

use tracing::debug;

use crate::error::{FsError, Result};
use crate::node::{bloom, Body, Node, NodeKind};
use crate::path::{self, glob};
use crate::volume::Volume;

use super::{arg_str, expect_args, is_keyword, lossy, Reply};

/// FS.FIND root pattern [TYPE t] — absolute paths of nodes whose basename
/// matches the glob, in depth-first preorder. t is one of file, dir,
/// symlink.
pub fn find(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 4)?;
    let type_filter = match args.get(2) {
        None => None,
        Some(kw) if is_keyword(kw, "TYPE") => {
            let raw = args.get(3).ok_or(FsError::Arity)?;
            Some(NodeKind::from_str(arg_str(raw)?).ok_or(FsError::Invalid)?)
        }
        Some(_) => return Err(FsError::Invalid),
    };
    let pattern = args[1];
    debug!("find(root={}, pattern={})", lossy(args[0]), lossy(pattern));

    let root_comps = vol.resolve(args[0], true)?;
    let root = vol.node_at(&root_comps).ok_or(FsError::NoEntry)?;

    let mut hits = Vec::new();
    let mut stack: Vec<(Vec<u8>, &Node)> = vec![(path::join(&root_comps), root)];
    while let Some((node_path, node)) = stack.pop() {
        if type_filter.map_or(true, |t| node.kind() == t)
            && glob::matches(pattern, basename(&node_path), false)
        {
            hits.push(Reply::Bulk(node_path.clone()));
        }
        if let Body::Dir(entries) = &node.body {
            for (name, child) in entries.iter().rev() {
                stack.push((path::child(&node_path, name), child));
            }
        }
    }
    Ok(Reply::Array(hits))
}

/// FS.GREP root pattern [NOCASE] — (path, line, text) triples for every
/// payload line matching the glob. A file whose bloom filter rules out
/// one of the pattern's literal tokens is skipped without reading; short
/// tokens never prune.
pub fn grep(vol: &Volume, args: &[&[u8]]) -> Result<Reply> {
    expect_args(args, 2, 3)?;
    let nocase = match args.get(2) {
        Some(flag) if is_keyword(flag, "NOCASE") => true,
        Some(_) => return Err(FsError::Invalid),
        None => false,
    };
    let pattern = args[1];
    debug!(
        "grep(root={}, pattern={}, nocase={})",
        lossy(args[0]),
        lossy(pattern),
        nocase
    );

    let probes: Vec<Vec<u8>> = glob::literal_tokens(pattern)
        .into_iter()
        .filter(|token| token.len() >= bloom::MIN_TOKEN_LEN)
        .collect();

    let root_comps = vol.resolve(args[0], true)?;
    let root = vol.node_at(&root_comps).ok_or(FsError::NoEntry)?;

    let mut hits = Vec::new();
    let mut stack: Vec<(Vec<u8>, &Node)> = vec![(path::join(&root_comps), root)];
    while let Some((node_path, node)) = stack.pop() {
        match &node.body {
            Body::Dir(entries) => {
                for (name, child) in entries.iter().rev() {
                    stack.push((path::child(&node_path, name), child));
                }
            }
            Body::File { data, bloom } => {
                if probes.iter().any(|token| !bloom.may_contain(token)) {
                    continue;
                }
                for (index, line) in split_lines(data).iter().enumerate() {
                    if glob::matches(pattern, line, nocase) {
                        hits.push(Reply::Array(vec![
                            Reply::Bulk(node_path.clone()),
                            Reply::Int(index as i64 + 1),
                            Reply::Bulk(line.to_vec()),
                        ]));
                    }
                }
            }
            Body::Symlink { .. } => {}
        }
    }
    Ok(Reply::Array(hits))
}

fn basename(node_path: &[u8]) -> &[u8] {
    match node_path.iter().rposition(|&b| b == b'/') {
        Some(i) => &node_path[i + 1..],
        None => node_path,
    }
}

/// Newline-delimited lines. A final line without a trailing newline is
/// included; a trailing newline does not produce a phantom empty line.
fn split_lines(payload: &[u8]) -> Vec<&[u8]> {
    if payload.is_empty() {
        return Vec::new();
    }
    let body = match payload.last() {
        Some(b'\n') => &payload[..payload.len() - 1],
        _ => payload,
    };
    body.split(|&b| b == b'\n').collect()
}
