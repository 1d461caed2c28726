use thiserror::Error;

/// Error kinds surfaced to clients of the host engine. The display strings
/// are stable message tokens; clients match on them, so they must not change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory")]
    NoEntry,

    #[error("not a directory")]
    NotDir,

    #[error("is a directory")]
    IsDir,

    #[error("file exists")]
    Exists,

    #[error("directory not empty")]
    NotEmpty,

    #[error("too many symbolic links")]
    Loop,

    #[error("invalid argument")]
    Invalid,

    #[error("not a symbolic link")]
    NotLink,

    #[error("corrupt value")]
    Corrupt,

    #[error("wrong number of arguments")]
    Arity,

    #[error("unknown command")]
    UnknownCommand,
}

pub type Result<T> = std::result::Result<T, FsError>;
