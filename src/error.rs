use std::fmt;
use std::io;

/// Error taxonomy for every operation exposed by this crate.
///
/// Variants correspond to component boundaries (device, superblock,
/// chain walker, directory/file engine) rather than to a single
/// underlying cause, so callers can match on *what kind of thing went
/// wrong* without inspecting a message string.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied argument violated a precondition (null/empty
    /// buffer, zero-length read where one was required, etc.).
    Fault,
    /// The requested file is not present in the root directory, or a
    /// non-root path was requested from `dir_open`.
    NotFound,
    /// The directory entry that was found names a directory or a
    /// volume-label entry, not a regular file.
    IsDirectory,
    /// Sector or cluster arithmetic escaped the bounds of the device,
    /// or a `seek` target fell outside `[0, file_size]`.
    OutOfRange,
    /// An allocation failed.
    OutOfMemory,
    /// The underlying block device failed to read/write.
    Io(io::Error),
    /// The boot sector signature did not equal `0xAA55`.
    BadSignature,
    /// The FAT, the BPB, or a directory entry violated an on-disk
    /// invariant (reserved/bad/free cluster inside a chain, chain
    /// longer than the volume's data region, malformed BPB fields).
    Corrupt,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fault => write!(f, "invalid argument"),
            Error::NotFound => write!(f, "no such file or directory"),
            Error::IsDirectory => write!(f, "entry is a directory"),
            Error::OutOfRange => write!(f, "value out of range"),
            Error::OutOfMemory => write!(f, "allocation failed"),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::BadSignature => write!(f, "boot sector signature mismatch"),
            Error::Corrupt => write!(f, "corrupted filesystem structure"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
