//! Error Types for Splitbin Datasets
//!
//! This module defines all error types that can occur while writing or
//! reading a dataset directory.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - `Io`: file system operations (missing directories and files surface
//!   here untouched, as `std::io::ErrorKind::NotFound`)
//!
//! ### Data Integrity Errors
//! - `IndexEntry`: a complete 12-byte index triplet (or the length prefix it
//!   points at) could not be read for a logical record. Out-of-range access
//!   and a truncated index file are indistinguishable to a reader, so both
//!   report this kind.
//! - `SizeMismatch`: the length prefix stored in a bin file disagrees with
//!   the length recorded in the index file.
//! - `Truncated`: a length prefix claims more bytes than the file holds.
//!
//! ### Writer Guards
//! - `RecordTooLarge`: a payload does not fit the u32 length prefix.
//! - `BinFull`: a bin file grew past the u32 offset field of an index entry.
//! - `InvalidSplits`: a write session was configured with zero bins.
//!
//! ## Usage
//! All fallible operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so callers can propagate with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no complete index entry for record {index}")]
    IndexEntry { index: u64 },

    #[error("size mismatch for record {index}: index file says {expected}, bin file says {found}")]
    SizeMismatch {
        index: u64,
        expected: u32,
        found: u32,
    },

    #[error("truncated record: prefix claims {expected} bytes, {remaining} remain")]
    Truncated { expected: u32, remaining: u64 },

    #[error("record of {length} bytes does not fit the u32 length prefix")]
    RecordTooLarge { length: u64 },

    #[error("bin {bin} grew past the u32 offset limit")]
    BinFull { bin: u32 },

    #[error("invalid split count: {0}")]
    InvalidSplits(u32),
}
