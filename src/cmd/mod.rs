//! FS.* command handlers. The host engine resolves the key to a
//! [`Volume`] and hands each handler the remaining arguments; every
//! command either fully applies or has no effect.

pub mod mutate;
pub mod read;
pub mod search;

use crate::error::{FsError, Result};
use crate::volume::Volume;

/// Reply shapes of the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Int(i64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(bytes.into())
    }
}

/// Route a command to its handler. `name` is matched case-insensitively,
/// with or without the `FS.` prefix; `args` are the arguments after the
/// key (the host engine owns key lookup).
pub fn dispatch(vol: &mut Volume, name: &str, args: &[&[u8]]) -> Result<Reply> {
    let upper = name.to_ascii_uppercase();
    let cmd = upper.strip_prefix("FS.").unwrap_or(&upper);
    match cmd {
        "ECHO" => mutate::echo(vol, args),
        "APPEND" => mutate::append(vol, args),
        "TOUCH" => mutate::touch(vol, args),
        "MKDIR" => mutate::mkdir(vol, args),
        "RM" => mutate::rm(vol, args),
        "CP" => mutate::cp(vol, args),
        "MV" => mutate::mv(vol, args),
        "CHMOD" => mutate::chmod(vol, args),
        "CHOWN" => mutate::chown(vol, args),
        "LN" => mutate::ln(vol, args),
        "UTIMENS" => mutate::utimens(vol, args),
        "CAT" => read::cat(vol, args),
        "LS" => read::ls(vol, args),
        "STAT" => read::stat(vol, args),
        "TEST" => read::test(vol, args),
        "READLINK" => read::readlink(vol, args),
        "TREE" => read::tree(vol, args),
        "INFO" => read::info(vol, args),
        "FIND" => search::find(vol, args),
        "GREP" => search::grep(vol, args),
        _ => Err(FsError::UnknownCommand),
    }
}

pub(crate) fn expect_args(args: &[&[u8]], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(FsError::Arity);
    }
    Ok(())
}

pub(crate) fn arg_str<'a>(arg: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(arg).map_err(|_| FsError::Invalid)
}

pub(crate) fn arg_u32(arg: &[u8]) -> Result<u32> {
    arg_str(arg)?.parse().map_err(|_| FsError::Invalid)
}

pub(crate) fn arg_u64(arg: &[u8]) -> Result<u64> {
    arg_str(arg)?.parse().map_err(|_| FsError::Invalid)
}

/// Case-insensitive option keyword test.
pub(crate) fn is_keyword(arg: &[u8], word: &str) -> bool {
    arg.eq_ignore_ascii_case(word.as_bytes())
}

/// Lossy rendering of path arguments for log lines.
pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
