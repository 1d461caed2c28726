//! Volume <-> byte stream codec, backing the host engine's persistence
//! hooks (RDB dump/restore of the opaque value).
//!
//! Layout, all integers little-endian: magic `RFSv`, version u16, then a
//! pre-order walk of the tree. Each node is a tag byte (0=dir, 1=file,
//! 2=symlink) and a metadata block (mode u16, uid u32, gid u32, three u64
//! times, size u64) followed by the variant payload: directories carry a
//! u32 child count and then each child as a u16-length name plus the
//! child's own record; files carry a u64 payload length, the payload and
//! the bloom bitmap; symlinks carry a u16 target length and the target.
//! The volume id is runtime-only and is not part of the stream.

use std::mem;

use tracing::{debug, warn};

use crate::error::{FsError, Result};
use crate::node::{
    bloom::{TokenFilter, FILTER_BYTES},
    Body, Entries, Metadata, Node, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG,
};
use crate::path;

use super::Volume;

pub const MAGIC: &[u8; 4] = b"RFSv";
pub const VERSION: u16 = 1;

const TAG_DIR: u8 = 0;
const TAG_FILE: u8 = 1;
const TAG_SYMLINK: u8 = 2;

/// Serialize a volume. Infallible: every admitted volume is encodable
/// (component and target lengths are capped on the way in).
pub fn save(vol: &Volume) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());

    let mut stack: Vec<(Option<&Vec<u8>>, &Node)> = vec![(None, vol.root())];
    while let Some((name, node)) = stack.pop() {
        if let Some(name) = name {
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name);
        }
        write_header(&mut out, node);
        match &node.body {
            Body::Dir(entries) => {
                out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                for (child_name, child) in entries.iter().rev() {
                    stack.push((Some(child_name), child));
                }
            }
            Body::File { data, bloom } => {
                out.extend_from_slice(&(data.len() as u64).to_le_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(bloom.as_bytes());
            }
            Body::Symlink { target } => {
                out.extend_from_slice(&(target.len() as u16).to_le_bytes());
                out.extend_from_slice(target);
            }
        }
    }

    debug!("volume {} serialized: {} bytes", vol.id(), out.len());
    out
}

fn write_header(out: &mut Vec<u8>, node: &Node) {
    let tag = match node.body {
        Body::Dir(_) => TAG_DIR,
        Body::File { .. } => TAG_FILE,
        Body::Symlink { .. } => TAG_SYMLINK,
    };
    out.push(tag);
    out.extend_from_slice(&node.meta.mode.to_le_bytes());
    out.extend_from_slice(&node.meta.uid.to_le_bytes());
    out.extend_from_slice(&node.meta.gid.to_le_bytes());
    out.extend_from_slice(&node.meta.atime_ms.to_le_bytes());
    out.extend_from_slice(&node.meta.mtime_ms.to_le_bytes());
    out.extend_from_slice(&node.meta.ctime_ms.to_le_bytes());
    out.extend_from_slice(&node.size().to_le_bytes());
}

/// Deserialize a volume, validating the stream against the data model:
/// magic, version, tag/mode agreement, declared sizes, entry name
/// validity and uniqueness, and exact consumption. Any violation aborts
/// with `Corrupt` and the host engine discards the value.
pub fn load(raw: &[u8]) -> Result<Volume> {
    let mut cur = Cursor { buf: raw, pos: 0 };

    if cur.take(MAGIC.len())? != MAGIC {
        warn!("rejecting volume payload: bad magic");
        return Err(FsError::Corrupt);
    }
    let version = cur.u16()?;
    if version != VERSION {
        warn!("rejecting volume payload: unknown version {version}");
        return Err(FsError::Corrupt);
    }

    let root = read_tree(&mut cur)?;
    if cur.pos != raw.len() {
        warn!(
            "rejecting volume payload: {} trailing bytes",
            raw.len() - cur.pos
        );
        return Err(FsError::Corrupt);
    }
    Ok(Volume::from_root(root))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(FsError::Corrupt)?;
        let slice = self.buf.get(self.pos..end).ok_or(FsError::Corrupt)?;
        self.pos = end;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

enum Record {
    Dir { meta: Metadata, children: u32 },
    Leaf(Node),
}

fn read_record(cur: &mut Cursor) -> Result<Record> {
    let tag = cur.u8()?;
    let meta = Metadata {
        mode: cur.u16()?,
        uid: cur.u32()?,
        gid: cur.u32()?,
        atime_ms: cur.u64()?,
        mtime_ms: cur.u64()?,
        ctime_ms: cur.u64()?,
    };
    let size = cur.u64()?;

    match tag {
        TAG_DIR => {
            check_nibble(meta.mode, S_IFDIR)?;
            let children = cur.u32()?;
            if size != u64::from(children) {
                return Err(FsError::Corrupt);
            }
            Ok(Record::Dir { meta, children })
        }
        TAG_FILE => {
            check_nibble(meta.mode, S_IFREG)?;
            let len = cur.u64()?;
            if len != size || len > cur.remaining() as u64 {
                return Err(FsError::Corrupt);
            }
            let data = cur.take(len as usize)?.to_vec();
            let bloom =
                TokenFilter::from_bytes(cur.take(FILTER_BYTES)?).ok_or(FsError::Corrupt)?;
            Ok(Record::Leaf(Node::from_parts(
                meta,
                Body::File { data, bloom },
            )))
        }
        TAG_SYMLINK => {
            check_nibble(meta.mode, S_IFLNK)?;
            let len = cur.u16()?;
            if u64::from(len) != size {
                return Err(FsError::Corrupt);
            }
            let target = cur.take(len as usize)?.to_vec();
            Ok(Record::Leaf(Node::from_parts(
                meta,
                Body::Symlink { target },
            )))
        }
        _ => Err(FsError::Corrupt),
    }
}

fn check_nibble(mode: u16, expected: u16) -> Result<()> {
    if mode & S_IFMT == expected {
        Ok(())
    } else {
        Err(FsError::Corrupt)
    }
}

struct Frame {
    meta: Metadata,
    remaining: u32,
    entries: Entries,
    /// Entry name in the parent frame; unused for the root.
    name: Vec<u8>,
}

/// Iterative reconstruction of the pre-order stream.
fn read_tree(cur: &mut Cursor) -> Result<Node> {
    let (meta, children) = match read_record(cur)? {
        Record::Dir { meta, children } => (meta, children),
        // The root is always a directory.
        Record::Leaf(_) => return Err(FsError::Corrupt),
    };

    let mut parents: Vec<Frame> = Vec::new();
    let mut current = Frame {
        meta,
        remaining: children,
        entries: Entries::new(),
        name: Vec::new(),
    };

    loop {
        if current.remaining > 0 {
            current.remaining -= 1;
            let name_len = cur.u16()?;
            let name = cur.take(name_len as usize)?.to_vec();
            if !path::valid_name(&name) {
                return Err(FsError::Corrupt);
            }
            match read_record(cur)? {
                Record::Leaf(node) => {
                    if current.entries.insert(name, node).is_some() {
                        // Duplicate entry name.
                        return Err(FsError::Corrupt);
                    }
                }
                Record::Dir { meta, children } => {
                    let frame = Frame {
                        meta,
                        remaining: children,
                        entries: Entries::new(),
                        name,
                    };
                    parents.push(mem::replace(&mut current, frame));
                }
            }
            continue;
        }

        let Frame {
            meta,
            entries,
            name,
            remaining: _,
        } = current;
        let node = Node::from_parts(meta, Body::Dir(entries));
        match parents.pop() {
            Some(mut parent) => {
                if parent.entries.insert(name, node).is_some() {
                    return Err(FsError::Corrupt);
                }
                current = parent;
            }
            None => return Ok(node),
        }
    }
}
