#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("FS: {0}")]
    Fs(#[from] FsError),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("Not found")]
    NotFound,
    #[error("Already exists")]
    AlreadyExists,
    #[error("Not a directory")]
    NotADirectory,
    #[error("Is a directory")]
    IsADirectory,
    #[error("Directory not empty")]
    DirectoryNotEmpty,
    #[error("No space")]
    NoSpace,
    #[error("Invalid path")]
    InvalidPath,
    #[error("Invalid name")]
    InvalidName,
    #[error("Read-only")]
    ReadOnly,
    #[error("Corrupt")]
    Corrupt,
    #[error("Unsupported operation")]
    Unsupported,
}

impl Error {
    /// The filesystem-level kind, if this is not an I/O failure.
    pub fn fs_kind(&self) -> Option<FsError> {
        match self {
            Error::Io(_) => None,
            Error::Fs(kind) => Some(*kind),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
