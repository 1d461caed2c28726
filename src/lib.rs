//! In-memory POSIX-like filesystem stored as a single value of a
//! Redis-compatible host engine. One [`Volume`] holds one complete
//! filesystem (directories, regular files, symbolic links and their
//! metadata); the `FS.*` command handlers in [`cmd`] mutate and query it
//! atomically per command.
//!
//! The host engine owns key lookup, replication and persistence plumbing.
//! This crate supplies the value type plus the hooks the engine calls:
//! command handlers ([`cmd::dispatch`]), serialization
//! ([`volume::persist`]), teardown (`Drop` on [`Volume`]) and the memory
//! estimate ([`Volume::mem_usage`]).

pub mod cmd;
pub mod error;
pub mod node;
pub mod path;
pub mod volume;

pub use error::{FsError, Result};
pub use volume::Volume;

/// Type tag registered with the host engine. Must be exactly 9 ASCII chars.
pub const TYPE_TAG: &str = "redis-fs0";
