pub mod bloom;

use std::collections::BTreeMap;
use std::mem;

use self::bloom::TokenFilter;

/// POSIX type nibble values in the 16-bit mode word.
pub const S_IFMT: u16 = 0o170000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFLNK: u16 = 0o120000;

/// Permission bits retained by chmod.
pub const PERM_MASK: u16 = 0o7777;

pub const DEFAULT_DIR_MODE: u16 = S_IFDIR | 0o755;
pub const DEFAULT_FILE_MODE: u16 = S_IFREG | 0o644;
pub const DEFAULT_LINK_MODE: u16 = S_IFLNK | 0o777;

/// Metadata shared by every node kind. Sizes are derived from the body
/// (child count, payload length, target length), never stored, so the
/// size invariant cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Permission bits plus type nibble. Stored, not enforced.
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime_ms: u64,
    pub mtime_ms: u64,
    pub ctime_ms: u64,
}

impl Metadata {
    fn at(mode: u16, now_ms: u64) -> Self {
        Self {
            mode,
            uid: 0,
            gid: 0,
            atime_ms: now_ms,
            mtime_ms: now_ms,
            ctime_ms: now_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    File,
    Symlink,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Dir => "dir",
            NodeKind::File => "file",
            NodeKind::Symlink => "symlink",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dir" => Some(NodeKind::Dir),
            "file" => Some(NodeKind::File),
            "symlink" => Some(NodeKind::Symlink),
            _ => None,
        }
    }
}

/// Directory entry map. BTreeMap keys give name uniqueness and
/// lexicographic ascending byte order for LS/FIND/GREP/TREE determinism.
pub type Entries = BTreeMap<Vec<u8>, Node>;

#[derive(Debug)]
pub enum Body {
    Dir(Entries),
    File { data: Vec<u8>, bloom: TokenFilter },
    Symlink { target: Vec<u8> },
}

#[derive(Debug)]
pub struct Node {
    pub meta: Metadata,
    pub body: Body,
}

impl Node {
    pub fn new_dir(now_ms: u64) -> Self {
        Self {
            meta: Metadata::at(DEFAULT_DIR_MODE, now_ms),
            body: Body::Dir(Entries::new()),
        }
    }

    pub fn new_file(data: Vec<u8>, now_ms: u64) -> Self {
        let bloom = TokenFilter::build(&data);
        Self {
            meta: Metadata::at(DEFAULT_FILE_MODE, now_ms),
            body: Body::File { data, bloom },
        }
    }

    pub fn new_symlink(target: Vec<u8>, now_ms: u64) -> Self {
        Self {
            meta: Metadata::at(DEFAULT_LINK_MODE, now_ms),
            body: Body::Symlink { target },
        }
    }

    pub fn from_parts(meta: Metadata, body: Body) -> Self {
        Self { meta, body }
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            Body::Dir(_) => NodeKind::Dir,
            Body::File { .. } => NodeKind::File,
            Body::Symlink { .. } => NodeKind::Symlink,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.body, Body::Dir(_))
    }

    /// Size per kind: child count, payload length, or target length.
    pub fn size(&self) -> u64 {
        match &self.body {
            Body::Dir(entries) => entries.len() as u64,
            Body::File { data, .. } => data.len() as u64,
            Body::Symlink { target } => target.len() as u64,
        }
    }

    pub fn entries(&self) -> Option<&Entries> {
        match &self.body {
            Body::Dir(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut Entries> {
        match &mut self.body {
            Body::Dir(entries) => Some(entries),
            _ => None,
        }
    }

    /// Nodes in this subtree, the node itself included. Iterative:
    /// directories may nest arbitrarily deep.
    pub fn count_nodes(&self) -> u64 {
        let mut count = 0u64;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            if let Body::Dir(entries) = &node.body {
                stack.extend(entries.values());
            }
        }
        count
    }

    /// Deep-copy this subtree. Mode, uid, gid, mtime and atime carry over;
    /// ctime is set to `ctime_ms` and file blooms are rebuilt from the
    /// copied payloads. Returns the copy and the number of nodes in it.
    pub fn deep_copy(&self, ctime_ms: u64) -> (Node, u64) {
        match &self.body {
            Body::File { data, .. } => (
                Node::from_parts(
                    copied_meta(self.meta, ctime_ms),
                    Body::File {
                        data: data.clone(),
                        bloom: TokenFilter::build(data),
                    },
                ),
                1,
            ),
            Body::Symlink { target } => (
                Node::from_parts(
                    copied_meta(self.meta, ctime_ms),
                    Body::Symlink {
                        target: target.clone(),
                    },
                ),
                1,
            ),
            Body::Dir(entries) => copy_dir(self.meta, entries, ctime_ms),
        }
    }
}

fn copied_meta(src: Metadata, ctime_ms: u64) -> Metadata {
    Metadata {
        ctime_ms,
        ..src
    }
}

struct CopyFrame<'a> {
    meta: Metadata,
    src: std::collections::btree_map::Iter<'a, Vec<u8>, Node>,
    built: Entries,
    /// Entry name in the parent frame; unused for the copy root.
    name: Vec<u8>,
}

/// Iterative post-order copy of a directory subtree.
fn copy_dir(meta: Metadata, entries: &Entries, ctime_ms: u64) -> (Node, u64) {
    let mut count = 0u64;
    let mut parents: Vec<CopyFrame> = Vec::new();
    let mut current = CopyFrame {
        meta: copied_meta(meta, ctime_ms),
        src: entries.iter(),
        built: Entries::new(),
        name: Vec::new(),
    };

    loop {
        if let Some((name, child)) = current.src.next() {
            match &child.body {
                Body::Dir(child_entries) => {
                    let frame = CopyFrame {
                        meta: copied_meta(child.meta, ctime_ms),
                        src: child_entries.iter(),
                        built: Entries::new(),
                        name: name.clone(),
                    };
                    parents.push(mem::replace(&mut current, frame));
                }
                _ => {
                    let (copy, n) = child.deep_copy(ctime_ms);
                    current.built.insert(name.clone(), copy);
                    count += n;
                }
            }
            continue;
        }

        count += 1;
        let CopyFrame {
            meta,
            built,
            name,
            src: _,
        } = current;
        let node = Node::from_parts(meta, Body::Dir(built));
        match parents.pop() {
            Some(mut parent) => {
                parent.built.insert(name, node);
                current = parent;
            }
            None => return (node, count),
        }
    }
}

impl Drop for Node {
    // The default recursive drop would exhaust the native stack on
    // adversarially deep trees; dismantle directories iteratively instead.
    fn drop(&mut self) {
        if let Body::Dir(entries) = &mut self.body {
            if entries.is_empty() {
                return;
            }
            let mut stack: Vec<Node> = mem::take(entries).into_values().collect();
            while let Some(mut node) = stack.pop() {
                if let Body::Dir(entries) = &mut node.body {
                    stack.extend(mem::take(entries).into_values());
                }
            }
        }
    }
}
