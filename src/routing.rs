//! IDX1 routing table — format anchor for the index pair.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic       = "IDX1"
//!    4      2   version     (u16; readers accept v1–v3, writer emits v3)
//!    6      2   reserved    = 0
//!    8      4   entry_count (u32)
//!   12   N×28   entries:
//!                 0  8  start_rva    (u64)
//!                 8  8  block_offset (u64, byte offset into IDX2)
//!                16  4  block_size   (u32)
//!                20  4  reserved     = 0
//! ```
//!
//! # Version gate
//! v1 maps RVAs to 1-based line numbers.  v2 adds `total_dump_lines` to the
//! IDX2 header.  v3 keeps the v2 layout and maps to 0-based dump byte
//! offsets instead.  Readers accept all three; the writer emits v3 only.
//!
//! # Ordering invariant
//! Entries are sorted ascending by `start_rva`.  The reader rejects a
//! strictly-decreasing adjacent pair; equal neighbours pass, which keeps a
//! duplicate-heavy dump loadable.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// On-disk magic of the routing table.
pub const IDX1_MAGIC: &[u8; 4] = b"IDX1";

/// Format version written by this build.
pub const FORMAT_VERSION: u16 = 3;
pub const MIN_SUPPORTED_VERSION: u16 = 1;
pub const MAX_SUPPORTED_VERSION: u16 = 3;

/// Byte size of one routing entry.
pub const IDX1_ENTRY_SIZE: usize = 28;

#[inline]
pub fn version_supported(v: u16) -> bool {
    (MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&v)
}

/// One IDX1 record pointing at one IDX2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    /// RVA of the block's first record.
    pub start_rva: u64,
    /// Absolute byte offset of the block within IDX2.
    pub block_offset: u64,
    /// On-disk byte size of the block.
    pub block_size: u32,
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("invalid magic — not an IDX1 routing table")]
    InvalidMagic,
    #[error("unsupported index version {0} (this build reads v{MIN_SUPPORTED_VERSION}–v{MAX_SUPPORTED_VERSION})")]
    UnsupportedVersion(u16),
    #[error("routing table header truncated")]
    HeaderTruncated,
    #[error("routing table truncated after {read} of {declared} entries")]
    Truncated { read: u32, declared: u32 },
    #[error("routing entries out of order at index {index}: {prev:#x} > {next:#x}")]
    OutOfOrder { index: usize, prev: u64, next: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Write a complete IDX1 file (v3).
pub fn write_routing<W: Write>(mut w: W, entries: &[RoutingEntry]) -> io::Result<()> {
    w.write_all(IDX1_MAGIC)?;
    w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u16::<LittleEndian>(0)?;
    w.write_u32::<LittleEndian>(entries.len() as u32)?;
    for e in entries {
        w.write_u64::<LittleEndian>(e.start_rva)?;
        w.write_u64::<LittleEndian>(e.block_offset)?;
        w.write_u32::<LittleEndian>(e.block_size)?;
        w.write_u32::<LittleEndian>(0)?;
    }
    Ok(())
}

/// Read and validate a complete IDX1 file.
///
/// Returns the file's version and its routing entries.  Validation order:
/// magic, version, then the `start_rva` ordering invariant.  Entries are
/// read one at a time, so a lying `entry_count` cannot trigger a huge
/// upfront allocation.
pub fn read_routing<R: Read>(mut r: R) -> Result<(u16, Vec<RoutingEntry>), RoutingError> {
    let mut header = [0u8; 12];
    r.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RoutingError::HeaderTruncated,
        _ => RoutingError::Io(e),
    })?;

    if &header[0..4] != IDX1_MAGIC {
        return Err(RoutingError::InvalidMagic);
    }
    let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
    if !version_supported(version) {
        return Err(RoutingError::UnsupportedVersion(version));
    }
    let entry_count = u32::from_le_bytes(header[8..12].try_into().unwrap());

    let mut entries: Vec<RoutingEntry> = Vec::new();
    let mut buf = [0u8; IDX1_ENTRY_SIZE];
    for i in 0..entry_count {
        r.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => RoutingError::Truncated {
                read: i,
                declared: entry_count,
            },
            _ => RoutingError::Io(e),
        })?;
        let entry = RoutingEntry {
            start_rva: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            block_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            block_size: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        };
        if let Some(prev) = entries.last() {
            if prev.start_rva > entry.start_rva {
                return Err(RoutingError::OutOfOrder {
                    index: entries.len(),
                    prev: prev.start_rva,
                    next: entry.start_rva,
                });
            }
        }
        entries.push(entry);
    }
    Ok((version, entries))
}
