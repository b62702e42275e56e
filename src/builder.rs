//! High-level build facade — dump in, index pair out.
//!
//! ```no_run
//! use std::path::Path;
//! use rvamap::builder::{build_rva_index, BuildOptions};
//!
//! let stats = build_rva_index(
//!     Path::new("dump.cs"),
//!     Path::new("dump.idx1"),
//!     Path::new("dump.idx2"),
//!     &BuildOptions::default(),
//! )?;
//! println!("{} records in {} blocks", stats.records, stats.blocks);
//! # Ok::<(), rvamap::BuildError>(())
//! ```

use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::block::{pack_blocks, RvaRecord, DEFAULT_MAX_RECORDS_PER_BLOCK};
use crate::extract::extract_rva;
use crate::scan::{LineScanner, ScanError, MAX_DUMP_SIZE};
use crate::writer::write_index_files;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("max_records_per_block must be at least 1")]
    InvalidBlockCapacity,
    #[error("dump file is {0} bytes — larger than the {MAX_DUMP_SIZE}-byte limit")]
    DumpTooLarge(u64),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for [`build_rva_index`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Capacity cap for one block.  Must be positive.
    pub max_records_per_block: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_records_per_block: DEFAULT_MAX_RECORDS_PER_BLOCK,
        }
    }
}

/// Counters reported by a successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Physical lines in the dump.
    pub lines: u32,
    /// RVA records extracted (duplicates included).
    pub records: usize,
    /// Blocks written to IDX2.
    pub blocks: usize,
}

/// Scan a dump, collecting every RVA record plus the total line count.
///
/// Records come back in dump order, unsorted.
pub fn scan_records<R: BufRead>(reader: R) -> Result<(Vec<RvaRecord>, u32), ScanError> {
    let mut scanner = LineScanner::new(reader);
    let mut records = Vec::new();
    while let Some(line) = scanner.next_line()? {
        if let Some(rva) = extract_rva(line.raw) {
            records.push(RvaRecord {
                rva,
                dump_offset: line.offset,
            });
        }
    }
    Ok((records, scanner.lines_emitted()))
}

/// Sort records into the `(rva, dump_offset)` block-builder contract.
fn sort_records(records: &mut [RvaRecord]) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        records.par_sort_unstable();
    }
    #[cfg(not(feature = "parallel"))]
    records.sort_unstable();
}

/// Build the index pair for `dump`, writing `idx1` and `idx2`.
///
/// Fails fast on the first error.  An RVA-free dump still produces a valid
/// (empty) index pair.
pub fn build_rva_index(
    dump: &Path,
    idx1: &Path,
    idx2: &Path,
    options: &BuildOptions,
) -> Result<BuildStats, BuildError> {
    if options.max_records_per_block == 0 {
        return Err(BuildError::InvalidBlockCapacity);
    }

    let file = File::open(dump)?;
    let size = file.metadata()?.len();
    if size > MAX_DUMP_SIZE {
        return Err(BuildError::DumpTooLarge(size));
    }

    let (mut records, lines) = scan_records(BufReader::new(file))?;
    sort_records(&mut records);
    let blocks = pack_blocks(&records, options.max_records_per_block);

    let mut idx1_file = BufWriter::new(File::create(idx1)?);
    let mut idx2_file = BufWriter::new(File::create(idx2)?);
    write_index_files(&mut idx1_file, &mut idx2_file, &blocks, lines)?;
    idx2_file.flush()?;
    idx1_file.flush()?;

    info!(
        "indexed {}: {} lines, {} RVA records, {} blocks",
        dump.display(),
        lines,
        records.len(),
        blocks.len()
    );
    Ok(BuildStats {
        lines,
        records: records.len(),
        blocks: blocks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_records_extracts_in_dump_order() {
        let dump = b"header\n\t// RVA: 0x200 Offset: 0x200\n\t|-RVA: 0x100\n";
        let (records, lines) = scan_records(&dump[..]).unwrap();
        assert_eq!(lines, 3);
        assert_eq!(
            records,
            vec![
                RvaRecord { rva: 0x200, dump_offset: 7 },
                RvaRecord { rva: 0x100, dump_offset: 36 },
            ]
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let opts = BuildOptions { max_records_per_block: 0 };
        let err = build_rva_index(
            Path::new("/nonexistent"),
            Path::new("/nonexistent.idx1"),
            Path::new("/nonexistent.idx2"),
            &opts,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidBlockCapacity));
    }
}
