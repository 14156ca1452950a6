//! Random-Access Dataset Reader
//!
//! `Dataset` resolves a logical record index to `(bin, position, length)`
//! through the index file, then reads the payload out of the bin file:
//!
//! ```text
//! get(i)
//!     ↓
//! index.dat @ 12*i ──► (bin, position, length)
//!     ↓
//! bin{bin}.dat @ position ──► [prefix][payload]
//!     ↓                          │
//! prefix == length?  ──no──► SizeMismatch
//!     ↓ yes
//! payload (length bytes)
//! ```
//!
//! Every call opens, reads and closes its own file handles — no caching, no
//! shared mutable state — so one `Dataset` value can serve any access
//! pattern from any number of tasks at once. Callers that want throughput
//! over per-record seeks should use the bin-wise scan instead.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};

use splitbin_core::error::{Error, Result};
use splitbin_core::frame::LEN_PREFIX;
use splitbin_core::layout::{self, IndexEntry, INDEX_ENTRY_LEN};

use crate::binwise::{BinwiseScan, ScanOptions};

/// Random-access view of a dataset directory.
#[derive(Debug, Clone)]
pub struct Dataset {
    dir: PathBuf,
    index_path: PathBuf,
}

/// Summary of a dataset's on-disk contents, derived from the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    /// Number of complete index entries
    pub records: u64,

    /// Number of distinct bin files referenced
    pub bins: u32,

    /// Sum of all payload lengths, excluding prefixes and the index itself
    pub payload_bytes: u64,
}

impl Dataset {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let index_path = layout::index_path(&dir);
        Self { dir, index_path }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of records, computed from the index file size.
    pub async fn len(&self) -> Result<u64> {
        let meta = tokio::fs::metadata(&self.index_path).await?;
        Ok(meta.len() / INDEX_ENTRY_LEN as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Read the record at logical position `index`.
    ///
    /// Fails with [`Error::IndexEntry`] when `index` is at or past the end
    /// of the dataset (or the index file is truncated — a reader cannot
    /// tell the difference), and with [`Error::SizeMismatch`] when the bin
    /// file's length prefix disagrees with the index triplet.
    pub async fn get(&self, index: u64) -> Result<Bytes> {
        let (mut bin, entry) = self.open_record(index).await?;

        let mut payload = vec![0u8; entry.length as usize];
        if let Err(e) = bin.read_exact(&mut payload).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(self.truncation_error(&mut bin, &entry).await);
            }
            return Err(e.into());
        }
        Ok(Bytes::from(payload))
    }

    /// Walk every index entry and validate the length prefix it points at.
    ///
    /// Returns the number of records checked. The first inconsistency fails
    /// with the same error `get` would produce for that record. Payloads are
    /// not read, so this touches 16 bytes per record.
    pub async fn verify(&self) -> Result<u64> {
        let total = self.len().await?;
        for index in 0..total {
            self.open_record(index).await?;
        }
        Ok(total)
    }

    /// Summarize the dataset from a single sequential pass over the index.
    pub async fn stats(&self) -> Result<DatasetStats> {
        let file = File::open(&self.index_path).await?;
        let mut reader = BufReader::new(file);
        let mut stats = DatasetStats {
            records: 0,
            bins: 0,
            payload_bytes: 0,
        };
        let mut bins = HashSet::new();
        let mut buf = [0u8; INDEX_ENTRY_LEN];
        loop {
            match reader.read_exact(&mut buf).await {
                Ok(_) => {}
                // A trailing partial triplet (interrupted session) is not
                // part of the dataset.
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let entry = IndexEntry::decode(&buf);
            stats.records += 1;
            stats.payload_bytes += entry.length as u64;
            bins.insert(entry.bin);
        }
        stats.bins = bins.len() as u32;
        Ok(stats)
    }

    /// Stream every record bin by bin; see [`BinwiseScan`].
    pub fn scan_binwise(&self, options: ScanOptions) -> BinwiseScan {
        BinwiseScan::new(self.dir.clone(), options)
    }

    /// Resolve `index` through the index file and position the bin file
    /// just past the record's validated length prefix.
    async fn open_record(&self, index: u64) -> Result<(File, IndexEntry)> {
        let mut file = File::open(&self.index_path).await?;
        file.seek(SeekFrom::Start(index * INDEX_ENTRY_LEN as u64))
            .await?;
        let mut buf = [0u8; INDEX_ENTRY_LEN];
        read_exact_or(&mut file, &mut buf, || Error::IndexEntry { index }).await?;
        let entry = IndexEntry::decode(&buf);

        let mut bin = File::open(layout::bin_path(&self.dir, entry.bin)).await?;
        bin.seek(SeekFrom::Start(entry.position as u64)).await?;

        let mut prefix = [0u8; LEN_PREFIX];
        read_exact_or(&mut bin, &mut prefix, || Error::IndexEntry { index }).await?;
        let found = u32::from_le_bytes(prefix);
        if found != entry.length {
            return Err(Error::SizeMismatch {
                index,
                expected: entry.length,
                found,
            });
        }

        Ok((bin, entry))
    }

    /// Build the truncation error for a payload read that hit end of file.
    async fn truncation_error(&self, bin: &mut File, entry: &IndexEntry) -> Error {
        let remaining = match bin.metadata().await {
            Ok(meta) => meta
                .len()
                .saturating_sub(entry.position as u64 + LEN_PREFIX as u64),
            Err(_) => 0,
        };
        Error::Truncated {
            expected: entry.length,
            remaining,
        }
    }
}

async fn read_exact_or<F>(file: &mut File, buf: &mut [u8], err: F) -> Result<()>
where
    F: FnOnce() -> Error,
{
    match file.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(err()),
        Err(e) => Err(e.into()),
    }
}
