pub mod glob;

use crate::error::{FsError, Result};

/// Parse an absolute path into its normalized components.
///
/// Runs of `/` collapse, `.` components are skipped, and `..` pops the
/// previous component (popping past the root is clamped). The root `/`
/// parses to an empty component list. Relative paths, the empty string,
/// and components too long for the persisted name encoding are rejected.
pub fn parse(raw: &[u8]) -> Result<Vec<Vec<u8>>> {
    if raw.first() != Some(&b'/') {
        return Err(FsError::Invalid);
    }
    let mut comps: Vec<Vec<u8>> = Vec::new();
    for comp in raw.split(|&b| b == b'/') {
        if comp.is_empty() || comp == b"." {
            continue;
        }
        if comp == b".." {
            comps.pop();
        } else if comp.len() > u16::MAX as usize {
            return Err(FsError::Invalid);
        } else {
            comps.push(comp.to_vec());
        }
    }
    Ok(comps)
}

/// Render a component chain back into canonical string form: a single
/// leading `/`, no trailing `/` except for the root itself.
pub fn join(comps: &[Vec<u8>]) -> Vec<u8> {
    if comps.is_empty() {
        return b"/".to_vec();
    }
    let mut out = Vec::with_capacity(comps.iter().map(|c| c.len() + 1).sum());
    for comp in comps {
        out.push(b'/');
        out.extend_from_slice(comp);
    }
    out
}

/// Append one more component to an already-canonical path.
pub fn child(parent: &[u8], name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parent.len() + name.len() + 1);
    if parent != b"/" {
        out.extend_from_slice(parent);
    }
    out.push(b'/');
    out.extend_from_slice(name);
    out
}

/// Whether `name` may appear as a directory entry.
pub fn valid_name(name: &[u8]) -> bool {
    !name.is_empty() && name != b"." && name != b".." && !name.contains(&b'/')
}
