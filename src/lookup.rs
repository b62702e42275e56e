//! Query side — load the index pair, answer floor lookups.
//!
//! [`RvaLookup::load`] reads the routing table fully, validates the IDX2
//! header against it, and keeps the IDX2 reader open.  Blocks are read
//! lazily — exactly `block_size` bytes per touched block — and the last
//! decoded block sits in a single-slot cache, so resident memory stays
//! proportional to the routing table plus one block.
//!
//! [`RvaLookup::find_floor`] takes `&mut self`: the IDX2 reader seeks and
//! the cache slot is replaced during a query.  That makes the single-reader
//! discipline a compile-time property; to query from several threads, open
//! one instance per thread or add external locking.  Dropping the instance
//! closes the IDX2 handle.
//!
//! A decode failure surfaces as an error and leaves the cache untouched —
//! corruption in one block never looks like a hit and never poisons queries
//! into healthy blocks.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

use crate::block::{BlockError, DecodedBlock, IDX2_MAGIC};
use crate::routing::{
    read_routing, version_supported, RoutingEntry, RoutingError, MAX_SUPPORTED_VERSION,
    MIN_SUPPORTED_VERSION,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("routing table: {0}")]
    Routing(#[from] RoutingError),
    #[error("invalid magic — not an IDX2 block file")]
    InvalidMagic,
    #[error("unsupported block file version {0} (this build reads v{MIN_SUPPORTED_VERSION}–v{MAX_SUPPORTED_VERSION})")]
    UnsupportedVersion(u16),
    #[error("block file header truncated")]
    HeaderTruncated,
    #[error("block count mismatch: routing table has {routing} entries, block file declares {blocks}")]
    BlockCountMismatch { routing: usize, blocks: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("block {index}: {source}")]
    Block { index: usize, source: BlockError },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub struct RvaLookup<R> {
    routing: Vec<RoutingEntry>,
    blocks: R,
    version: u16,
    total_dump_lines: u32,
    cache: Option<(usize, DecodedBlock)>,
}

impl RvaLookup<File> {
    /// Open and validate an index pair from disk.
    pub fn open(idx1: &Path, idx2: &Path) -> Result<Self, LoadError> {
        let idx1 = BufReader::new(File::open(idx1)?);
        let idx2 = File::open(idx2)?;
        Self::load(idx1, idx2)
    }
}

impl<R: Read + Seek> RvaLookup<R> {
    /// Load the routing table from `idx1` and validate the `idx2` header.
    /// `idx2` stays open for lazy block reads.
    pub fn load<R1: Read>(idx1: R1, mut idx2: R) -> Result<Self, LoadError> {
        let (_, routing) = read_routing(idx1)?;

        let mut header = [0u8; 12];
        idx2.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => LoadError::HeaderTruncated,
            _ => LoadError::Io(e),
        })?;
        if &header[0..4] != IDX2_MAGIC {
            return Err(LoadError::InvalidMagic);
        }
        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if !version_supported(version) {
            return Err(LoadError::UnsupportedVersion(version));
        }
        let block_count = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let total_dump_lines = if version >= 2 {
            let mut extra = [0u8; 4];
            idx2.read_exact(&mut extra).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => LoadError::HeaderTruncated,
                _ => LoadError::Io(e),
            })?;
            u32::from_le_bytes(extra)
        } else {
            0
        };

        if block_count as usize != routing.len() {
            return Err(LoadError::BlockCountMismatch {
                routing: routing.len(),
                blocks: block_count,
            });
        }

        Ok(Self {
            routing,
            blocks: idx2,
            version,
            total_dump_lines,
            cache: None,
        })
    }

    /// Format version of the block file.  v1/v2 indexes map RVAs to 1-based
    /// line numbers, v3 to 0-based dump byte offsets.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Physical line count of the dump (0 for v1 indexes).
    pub fn total_dump_lines(&self) -> u32 {
        self.total_dump_lines
    }

    pub fn block_count(&self) -> usize {
        self.routing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routing.is_empty()
    }

    /// Floor lookup: the mapped value of the greatest indexed RVA ≤ `rva`.
    ///
    /// `Ok(None)` when the index is empty or `rva` is below every indexed
    /// RVA.  Corruption in a touched block surfaces as `Err`; the cached
    /// block is left intact in that case.
    pub fn find_floor(&mut self, rva: u64) -> Result<Option<u32>, LookupError> {
        if self.routing.is_empty() || rva < self.routing[0].start_rva {
            return Ok(None);
        }
        let b = self.routing.partition_point(|e| e.start_rva <= rva) - 1;

        let block = self.block(b)?;
        if let Some(i) = block.floor_index(rva) {
            return Ok(Some(block.values[i]));
        }

        // Every record of block `b` decoded above `rva` — possible only when
        // the block's first delta is non-zero.  The floor then sits at the
        // end of the previous block.
        if b > 0 {
            let prev = self.block(b - 1)?;
            return Ok(prev.values.last().copied());
        }
        Ok(None)
    }

    fn block(&mut self, index: usize) -> Result<&DecodedBlock, LookupError> {
        match self.cache {
            Some((cached, _)) if cached == index => {}
            _ => {
                let decoded = self.read_block(index)?;
                self.cache = Some((index, decoded));
            }
        }
        match &self.cache {
            Some((_, block)) => Ok(block),
            None => unreachable!("cache populated above"),
        }
    }

    /// Read exactly `block_size` bytes at `block_offset` and decode them.
    /// The cache slot is only replaced on success.
    fn read_block(&mut self, index: usize) -> Result<DecodedBlock, LookupError> {
        let entry = self.routing[index];
        self.blocks.seek(SeekFrom::Start(entry.block_offset))?;
        let mut buf = vec![0u8; entry.block_size as usize];
        self.blocks.read_exact(&mut buf)?;
        DecodedBlock::parse(&buf).map_err(|source| LookupError::Block { index, source })
    }
}
