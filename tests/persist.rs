//! Serialization round-trips and corrupt-stream rejection.

mod helpers;

use helpers::{int, ok, text, volume};
use rfs::volume::persist::{load, save};
use rfs::{FsError, Volume};

/// Build a volume exercising every node kind and metadata field.
fn populated() -> Volume {
    let mut v = volume();
    ok(&mut v, "FS.MKDIR", &["/docs/work", "PARENTS"]);
    ok(&mut v, "FS.ECHO", &["/docs/readme.md", "hello serde world\n"]);
    ok(&mut v, "FS.ECHO", &["/docs/work/todo", "ship it\n"]);
    ok(&mut v, "FS.LN", &["../readme.md", "/docs/work/link"]);
    ok(&mut v, "FS.CHMOD", &["/docs/readme.md", "600"]);
    ok(&mut v, "FS.CHOWN", &["/docs/readme.md", "42", "43"]);
    ok(&mut v, "FS.UTIMENS", &["/docs/readme.md", "111", "222"]);
    v
}

/// deserialize(serialize(v)) == v, by byte equality of a second dump.
#[test]
fn roundtrip_is_identity() {
    let v = populated();
    let bytes = save(&v);
    let restored = load(&bytes).expect("load back our own dump");
    assert_eq!(save(&restored), bytes);
}

#[test]
fn roundtrip_preserves_content_and_metadata() {
    let v = populated();
    let mut restored = load(&save(&v)).expect("load back our own dump");

    assert_eq!(
        text(&ok(&mut restored, "FS.CAT", &["/docs/readme.md"])),
        "hello serde world\n"
    );
    assert_eq!(
        text(&ok(&mut restored, "FS.READLINK", &["/docs/work/link"])),
        "../readme.md"
    );
    assert_eq!(
        text(&ok(&mut restored, "FS.CAT", &["/docs/work/link"])),
        "hello serde world\n"
    );
    assert_eq!(
        int(&helpers::stat_field(&mut restored, "/docs/readme.md", "mode")),
        0o100600
    );
    assert_eq!(
        int(&helpers::stat_field(&mut restored, "/docs/readme.md", "uid")),
        42
    );
    assert_eq!(
        int(&helpers::stat_field(&mut restored, "/docs/readme.md", "mtime_ms")),
        222
    );
}

/// The bloom bitmap travels with the file: content search still matches
/// after a reload.
#[test]
fn roundtrip_keeps_bloom_useful() {
    let v = populated();
    let mut restored = load(&save(&v)).expect("load back our own dump");
    let reply = ok(&mut restored, "FS.GREP", &["/", "*serde*"]);
    let hits = helpers::array(&reply);
    assert_eq!(hits.len(), 1);
}

#[test]
fn empty_volume_roundtrip() {
    let v = volume();
    let bytes = save(&v);
    let restored = load(&bytes).expect("load empty volume");
    assert_eq!(save(&restored), bytes);
    assert_eq!(restored.stats().directories, 1);
    assert_eq!(restored.stats().files, 0);
}

/// Volume ids are runtime-only: a reload allocates a fresh one.
#[test]
fn load_assigns_new_id() {
    let v = populated();
    let restored = load(&save(&v)).expect("load back our own dump");
    assert_ne!(v.id(), restored.id());
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = save(&populated());
    bytes[0] ^= 0xff;
    assert_eq!(load(&bytes).unwrap_err(), FsError::Corrupt);
}

#[test]
fn rejects_unknown_version() {
    let mut bytes = save(&populated());
    bytes[4] = 0x99;
    assert_eq!(load(&bytes).unwrap_err(), FsError::Corrupt);
}

#[test]
fn rejects_truncation_and_trailing_bytes() {
    let bytes = save(&populated());
    assert_eq!(
        load(&bytes[..bytes.len() - 1]).unwrap_err(),
        FsError::Corrupt
    );
    assert_eq!(load(&bytes[..10]).unwrap_err(), FsError::Corrupt);
    assert_eq!(load(&[]).unwrap_err(), FsError::Corrupt);

    let mut padded = bytes;
    padded.push(0);
    assert_eq!(load(&padded).unwrap_err(), FsError::Corrupt);
}

/// A declared size that disagrees with the reconstructed body is refused.
/// Offset 41 is the root directory's size field in an empty dump: magic
/// (4) + version (2) + tag (1) + mode (2) + uid/gid (8) + times (24).
#[test]
fn rejects_size_mismatch() {
    let mut bytes = save(&volume());
    bytes[41] = 5;
    assert_eq!(load(&bytes).unwrap_err(), FsError::Corrupt);
    let err = load(&bytes).unwrap_err();
    assert_eq!(err.to_string(), "corrupt value");
}
