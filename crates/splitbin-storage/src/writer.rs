//! Sequential Dataset Writer
//!
//! Spreads a sequence of records across bin files and records every
//! placement in the index file:
//!
//! ```text
//! records ──► bin assignment ──► bin00000000.dat  [len][payload]...
//!                  │        └──► bin00000001.dat  [len][payload]...
//!                  │                  ...
//!                  └───────────► index.dat  (bin, position, length)...
//! ```
//!
//! ## Bin Assignment
//!
//! Insertion slot `i` maps to bin `i % splits`. With `shuffle` enabled, one
//! uniformly random permutation of `[0, splits)` is drawn up front and the
//! slot is looked up through it, so shuffling changes *which bin* a record
//! lands in and nothing else: the index file stays in insertion order and
//! records never reorder within a bin.
//!
//! ## Session Semantics
//!
//! A write session opens the index file once, in append mode, and keeps one
//! open handle per bin it touches. Each record is encoded (prefix plus
//! payload) into a buffer and written with a single `write_all`, so a crash
//! mid-session leaves every file readable up to its last complete entry. No
//! locking is provided; concurrent writers against the same directory are
//! unsupported.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use splitbin_core::error::{Error, Result};
use splitbin_core::frame;
use splitbin_core::layout::{self, IndexEntry};

/// Options for one write session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Number of bin files to spread records across (must be >= 1)
    pub splits: u32,

    /// Permute which bin each insertion slot maps to
    pub shuffle: bool,

    /// Delete the target directory before writing
    pub start_clean: bool,

    /// Seed for the bin permutation; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            splits: 256,
            shuffle: false,
            start_clean: false,
            seed: None,
        }
    }
}

/// What a completed write session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Records appended by this session
    pub records: u64,

    /// Bin files this session wrote into
    pub bins_touched: u32,
}

/// Write a sequence of records into `dir` as a splitbin dataset.
///
/// Appends to an existing dataset unless `start_clean` is set. The dataset
/// is consistent once this returns; a crash mid-call leaves the index file
/// readable up to its last complete triplet.
pub async fn write_split_data<I>(
    dir: &Path,
    records: I,
    options: &WriteOptions,
) -> Result<WriteReport>
where
    I: IntoIterator<Item = Bytes>,
{
    if options.splits == 0 {
        return Err(Error::InvalidSplits(0));
    }

    if options.start_clean {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!(dir = ?dir, "removed existing dataset"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    tokio::fs::create_dir_all(dir).await?;

    // One permutation per session. It remaps slots to bins and nothing else.
    let permutation = if options.shuffle {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut slots: Vec<u32> = (0..options.splits).collect();
        slots.shuffle(&mut rng);
        Some(slots)
    } else {
        None
    };

    let mut index_file = BufWriter::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(layout::index_path(dir))
            .await?,
    );

    let mut bins = BinSet::new(dir);
    let mut buf = BytesMut::new();
    let mut written: u64 = 0;

    for (slot, payload) in records.into_iter().enumerate() {
        let round = (slot as u64 % options.splits as u64) as u32;
        let bin = match &permutation {
            Some(slots) => slots[round as usize],
            None => round,
        };

        buf.clear();
        frame::encode_frame(&mut buf, &payload)?;
        let position = bins.append(bin, &buf).await?;

        let entry = IndexEntry {
            bin,
            position,
            length: payload.len() as u32,
        };
        index_file.write_all(&entry.encode()).await?;
        written += 1;
    }

    index_file.flush().await?;

    let report = WriteReport {
        records: written,
        bins_touched: bins.touched(),
    };
    info!(
        dir = ?dir,
        records = report.records,
        bins = report.bins_touched,
        shuffle = options.shuffle,
        "write session complete"
    );
    Ok(report)
}

/// Open bin file handles for one write session.
struct BinSet<'a> {
    dir: &'a Path,
    open: HashMap<u32, BinHandle>,
}

struct BinHandle {
    file: File,
    end: u64,
}

impl<'a> BinSet<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            open: HashMap::new(),
        }
    }

    /// Append one encoded frame, returning the offset of its length prefix.
    async fn append(&mut self, bin: u32, frame: &[u8]) -> Result<u32> {
        let handle = match self.open.entry(bin) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let path = layout::bin_path(self.dir, bin);
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                let end = file.seek(SeekFrom::End(0)).await?;
                debug!(bin, path = ?path, end, "opened bin file");
                v.insert(BinHandle { file, end })
            }
        };

        let position = u32::try_from(handle.end).map_err(|_| Error::BinFull { bin })?;
        handle.file.write_all(frame).await?;
        handle.end += frame.len() as u64;
        Ok(position)
    }

    fn touched(&self) -> u32 {
        self.open.len() as u32
    }
}
