//! Error taxonomy for the storage engine.
//!
//! Two families live here on purpose. `StorageError` covers everything the
//! pager and B+ tree can fail at; most of its variants correspond to the
//! fatal conditions in the design doc (corrupt file, out-of-range page,
//! I/O failure) and are meant to be caught once, printed, and followed by
//! a process exit. `CommandError` covers the recoverable, user-facing
//! outcomes the REPL prints and continues after.

use std::fmt;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    /// The database file's length is not a multiple of the page size, or a
    /// node's header bytes don't decode to a known shape.
    Corrupt(String),
    /// A page number fell outside the pager's addressable range.
    PageOutOfBounds { page_num: u32, max: u32 },
    /// A child pointer equal to the `INVALID_PAGE_NUM` sentinel was dereferenced.
    InvalidPageNum,
    /// Attempted to flush or read a page the pager never loaded.
    PageNotResident(u32),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "i/o error: {}", e),
            StorageError::Corrupt(msg) => write!(f, "db file is corrupt: {}", msg),
            StorageError::PageOutOfBounds { page_num, max } => {
                write!(f, "page number {} exceeds the {}-page cache", page_num, max)
            }
            StorageError::InvalidPageNum => write!(f, "dereferenced an invalid page number"),
            StorageError::PageNotResident(p) => write!(f, "page {} was never loaded", p),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Recoverable, user-facing outcomes. The REPL prints these verbatim and
/// keeps the command loop running; they never cross into `StorageError`.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    SyntaxError,
    NegativeId,
    StringTooLong,
    DuplicateKey,
    UnrecognizedCommand(String),
    UnrecognizedKeyword(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::SyntaxError => write!(f, "Syntax error."),
            CommandError::NegativeId => write!(f, "ID must be positive."),
            CommandError::StringTooLong => write!(f, "String is too long."),
            CommandError::DuplicateKey => write!(f, "Error: Duplicate key."),
            CommandError::UnrecognizedCommand(input) => {
                write!(f, "Unrecognized command '{}'", input)
            }
            CommandError::UnrecognizedKeyword(input) => {
                write!(f, "Unrecognized keyword at start of '{}'.", input)
            }
        }
    }
}
