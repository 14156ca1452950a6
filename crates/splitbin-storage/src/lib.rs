//! Splitbin Storage Layer
//!
//! On-disk storage for large sequences of opaque byte records, written
//! append-only across many bin files so that any record can be fetched by
//! its sequential index in O(1) seeks, and full scans can stream bin by bin.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐
//! │ write_split_data │  spreads records over bins, appends the index
//! └────────┬─────────┘
//!          ▼
//!   dataset directory          index.dat + bin{00000000..}.dat
//!          │
//!          ├──► Dataset::get(i)        index-resolved random access
//!          ├──► Dataset::scan_binwise  sequential, bin-ordered streaming
//!          │            │
//!          │            ▼
//!          └──► Prefetcher / PrefetchStream
//!                       background production over a bounded channel
//! ┌──────────────────┐
//! │    consumer      │  e.g. a training loop
//! └──────────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### write_split_data
//! Single-writer append session. Round-robin bin assignment, optionally
//! remapped through a seeded random permutation; every placement is recorded
//! as a 12-byte triplet in the index file, in insertion order.
//!
//! ### Dataset
//! Stateless random access: `len()` from the index file size, `get(i)` via
//! one index seek plus one bin seek, with the stored length prefix validated
//! against the index triplet on every read. `verify()` and `stats()` audit a
//! whole dataset the same way.
//!
//! ### BinwiseScan
//! Full traversals that never touch the index file: each bin is read whole
//! and decoded, optionally shuffling bin order and in-bin record order.
//!
//! ### Prefetcher
//! Runs any [`RecordSource`] on a background task and hands records to the
//! consumer through a bounded channel, overlapping disk reads with
//! consumption.
//!
//! ## Usage
//!
//! ```ignore
//! use bytes::Bytes;
//! use splitbin_storage::{write_split_data, Dataset, ScanOptions, WriteOptions};
//!
//! let samples: Vec<Bytes> = load_samples();
//! write_split_data("/data/train".as_ref(), samples, &WriteOptions {
//!     splits: 64,
//!     shuffle: true,
//!     start_clean: true,
//!     seed: None,
//! })
//! .await?;
//!
//! let dataset = Dataset::new("/data/train");
//! let sample = dataset.get(17).await?;
//! ```

pub mod binwise;
pub mod dataset;
pub mod prefetch;
pub mod source;
pub mod writer;

pub use binwise::{BinwiseScan, ScanOptions};
pub use dataset::{Dataset, DatasetStats};
pub use prefetch::{PrefetchStream, Prefetcher, QUEUE_DEPTH};
pub use source::{IterSource, RecordSource};
pub use writer::{write_split_data, WriteOptions, WriteReport};

pub use splitbin_core::error::{Error, Result};
