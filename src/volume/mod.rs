pub mod persist;
pub mod resolve;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{FsError, Result};
use crate::node::{bloom, Body, Entries, Node};

/// Volume ids are monotonic across the process lifetime. The id is
/// runtime-only; it is reassigned when a volume is deserialized.
static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// One complete filesystem: the value stored under a single key of the
/// host engine. The root is always a directory.
#[derive(Debug)]
pub struct Volume {
    id: u64,
    root: Node,
}

impl Volume {
    pub fn new() -> Self {
        Self::from_root(Node::new_dir(now_ms()))
    }

    pub(crate) fn from_root(root: Node) -> Self {
        Self {
            id: NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed),
            root,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn root(&self) -> &Node {
        &self.root
    }

    /// Node at a canonical component chain, as produced by the resolver.
    pub(crate) fn node_at(&self, comps: &[Vec<u8>]) -> Option<&Node> {
        let mut node = &self.root;
        for comp in comps {
            node = node.entries()?.get(comp)?;
        }
        Some(node)
    }

    pub(crate) fn node_at_mut(&mut self, comps: &[Vec<u8>]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for comp in comps {
            node = node.entries_mut()?.get_mut(comp)?;
        }
        Some(node)
    }

    /// Entry map of the directory at a canonical component chain.
    pub(crate) fn entries_at(&self, comps: &[Vec<u8>]) -> Result<&Entries> {
        match self.node_at(comps) {
            Some(node) => node.entries().ok_or(FsError::NotDir),
            None => Err(FsError::NoEntry),
        }
    }

    pub(crate) fn entries_at_mut(&mut self, comps: &[Vec<u8>]) -> Result<&mut Entries> {
        match self.node_at_mut(comps) {
            Some(node) => node.entries_mut().ok_or(FsError::NotDir),
            None => Err(FsError::NoEntry),
        }
    }

    /// Aggregate counts over the whole tree, the root directory included.
    pub fn stats(&self) -> VolumeStats {
        let mut stats = VolumeStats::default();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match &node.body {
                Body::Dir(entries) => {
                    stats.directories += 1;
                    stack.extend(entries.values());
                }
                Body::File { data, .. } => {
                    stats.files += 1;
                    stats.total_bytes += data.len() as u64;
                }
                Body::Symlink { .. } => stats.symlinks += 1,
            }
        }
        stats
    }

    /// JSON snapshot of [`Volume::stats`] for host diagnostics.
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.stats()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Rough heap footprint, for the engine's memory-usage hook.
    pub fn mem_usage(&self) -> usize {
        use std::mem::size_of;
        // Map bookkeeping per directory entry, approximate.
        const ENTRY_OVERHEAD: usize = 48;

        let mut total = size_of::<Self>();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            total += size_of::<Node>();
            match &node.body {
                Body::Dir(entries) => {
                    for (name, child) in entries {
                        total += name.len() + ENTRY_OVERHEAD;
                        stack.push(child);
                    }
                }
                Body::File { data, .. } => total += data.capacity() + bloom::FILTER_BYTES,
                Body::Symlink { target } => total += target.capacity(),
            }
        }
        total
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate counts reported by FS.INFO and [`Volume::stats_json`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VolumeStats {
    pub files: u64,
    pub directories: u64,
    pub symlinks: u64,
    pub total_bytes: u64,
}

/// Milliseconds since the epoch, the timestamp domain of all node times.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
