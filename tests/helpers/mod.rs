//! Shared helpers for driving the FS.* command surface in tests.
#![allow(dead_code)]

use rfs::cmd::{dispatch, Reply};
use rfs::{FsError, Volume};

/// Fresh volume with a test tracing subscriber installed, so handler
/// traces surface in `--nocapture` runs.
pub fn volume() -> Volume {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Volume::new()
}

/// Dispatch a command built from string arguments.
pub fn run(vol: &mut Volume, cmd: &str, args: &[&str]) -> Result<Reply, FsError> {
    let raw: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
    dispatch(vol, cmd, &raw)
}

/// Dispatch and unwrap, panicking with the error token on failure.
pub fn ok(vol: &mut Volume, cmd: &str, args: &[&str]) -> Reply {
    match run(vol, cmd, args) {
        Ok(reply) => reply,
        Err(err) => panic!("{cmd} {args:?} failed: {err}"),
    }
}

/// Dispatch and expect failure, returning the error.
pub fn err(vol: &mut Volume, cmd: &str, args: &[&str]) -> FsError {
    match run(vol, cmd, args) {
        Ok(reply) => panic!("{cmd} {args:?} unexpectedly succeeded: {reply:?}"),
        Err(err) => err,
    }
}

pub fn int(reply: &Reply) -> i64 {
    match reply {
        Reply::Int(v) => *v,
        other => panic!("expected integer reply, got {other:?}"),
    }
}

pub fn text(reply: &Reply) -> String {
    match reply {
        Reply::Bulk(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("expected bulk reply, got {other:?}"),
    }
}

pub fn array(reply: &Reply) -> Vec<Reply> {
    match reply {
        Reply::Array(items) => items.clone(),
        other => panic!("expected array reply, got {other:?}"),
    }
}

/// One field of a STAT reply, by key.
pub fn stat_field(vol: &mut Volume, path: &str, key: &str) -> Reply {
    let reply = ok(vol, "FS.STAT", &[path]);
    let items = array(&reply);
    for pair in items.chunks(2) {
        if text(&pair[0]) == key {
            return pair[1].clone();
        }
    }
    panic!("STAT {path} reply has no field {key:?}");
}
