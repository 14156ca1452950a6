//! Format layer for splitbin datasets: the size-prefixed frame codec, the
//! index-entry codec and the dataset directory layout. Pure byte handling,
//! no I/O — the storage crate drives these against the file system.

pub mod error;
pub mod frame;
pub mod layout;

pub use error::{Error, Result};
pub use layout::IndexEntry;
