//! Path resolution over a volume tree.
//!
//! The resolver walks components against the live tree, expanding symbolic
//! links as it goes. Canonical results are component chains from the root
//! whose every intermediate element is a real directory name, so `..` in a
//! link target pops exactly one canonical level and cannot escape the root.

use crate::error::{FsError, Result};
use crate::node::{Body, Node};
use crate::path;

use super::{now_ms, Volume};

/// Maximum symlink expansions in a single resolve.
pub const MAX_SYMLINK_HOPS: u32 = 40;

impl Volume {
    /// Resolve `raw` to the canonical component chain of its target. With
    /// `follow_final` the final component's symlink chain is followed too;
    /// without it the link node itself is the result.
    pub(crate) fn resolve(&self, raw: &[u8], follow_final: bool) -> Result<Vec<Vec<u8>>> {
        let mut hops = 0u32;
        self.resolve_components(path::parse(raw)?, follow_final, &mut hops)
    }

    /// Resolve the parent directory of `raw` and split off the basename.
    /// The parent chain follows symlinks; the final component is untouched.
    pub(crate) fn resolve_parent(&self, raw: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
        let mut comps = path::parse(raw)?;
        // The root has no parent: `/` is never a create or delete target.
        let name = comps.pop().ok_or(FsError::Invalid)?;
        let mut hops = 0u32;
        let parent = self.resolve_components(comps, true, &mut hops)?;
        match self.node_at(&parent) {
            Some(node) if node.is_dir() => Ok((parent, name)),
            Some(_) => Err(FsError::NotDir),
            None => Err(FsError::NoEntry),
        }
    }

    fn resolve_components(
        &self,
        comps: Vec<Vec<u8>>,
        follow_final: bool,
        hops: &mut u32,
    ) -> Result<Vec<Vec<u8>>> {
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut todo = comps;
        todo.reverse();

        while let Some(comp) = todo.pop() {
            // `.` and `..` only reappear here through symlink expansion;
            // parse() already normalized the original path.
            if comp == b"." {
                continue;
            }
            if comp == b".." {
                stack.pop();
                continue;
            }

            let dir = self.entries_at(&stack)?;
            let child = dir.get(&comp).ok_or(FsError::NoEntry)?;
            let last = todo.is_empty();
            match &child.body {
                Body::Symlink { target } if follow_final || !last => {
                    expand_symlink(target, &mut stack, &mut todo, hops)?;
                }
                _ if last => {
                    stack.push(comp);
                    return Ok(stack);
                }
                Body::Dir(_) => stack.push(comp),
                _ => return Err(FsError::NotDir),
            }
        }
        Ok(stack)
    }

    /// Walk `comps` following symlinks, creating every missing component
    /// as a directory. An existing component that does not resolve to a
    /// directory fails with `conflict`. Returns the canonical chain of the
    /// resulting directory.
    pub(crate) fn walk_create(
        &mut self,
        comps: Vec<Vec<u8>>,
        conflict: FsError,
        hops: &mut u32,
    ) -> Result<Vec<Vec<u8>>> {
        enum Found {
            Missing,
            Dir,
            Link(Vec<u8>),
            Other,
        }

        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut todo = comps;
        todo.reverse();

        while let Some(comp) = todo.pop() {
            if comp == b"." {
                continue;
            }
            if comp == b".." {
                stack.pop();
                continue;
            }

            let found = match self.entries_at(&stack)?.get(&comp) {
                None => Found::Missing,
                Some(node) => match &node.body {
                    Body::Dir(_) => Found::Dir,
                    Body::Symlink { target } => Found::Link(target.clone()),
                    Body::File { .. } => Found::Other,
                },
            };

            match found {
                Found::Missing => {
                    let node = Node::new_dir(now_ms());
                    self.entries_at_mut(&stack)?.insert(comp.clone(), node);
                    stack.push(comp);
                }
                Found::Dir => stack.push(comp),
                Found::Link(target) => expand_symlink(&target, &mut stack, &mut todo, hops)?,
                Found::Other => return Err(conflict),
            }
        }
        Ok(stack)
    }
}

/// Splice a symlink target ahead of the remaining components. Absolute
/// targets restart from the root; relative ones continue from the current
/// canonical position.
fn expand_symlink(
    target: &[u8],
    stack: &mut Vec<Vec<u8>>,
    todo: &mut Vec<Vec<u8>>,
    hops: &mut u32,
) -> Result<()> {
    *hops += 1;
    if *hops > MAX_SYMLINK_HOPS {
        return Err(FsError::Loop);
    }
    if target.is_empty() {
        return Err(FsError::NoEntry);
    }
    if target[0] == b'/' {
        stack.clear();
    }
    for part in target.split(|&b| b == b'/').rev() {
        if !part.is_empty() {
            todo.push(part.to_vec());
        }
    }
    Ok(())
}
