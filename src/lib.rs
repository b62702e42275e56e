//! # rvamap — RVA and type-definition indexes over dump listings
//!
//! A managed-runtime analyzer emits a line-oriented "dump" describing every
//! type and method of an application binary; method lines carry hexadecimal
//! Relative Virtual Addresses (RVAs).  This crate builds a two-file index
//! over such a dump and answers floor lookups (greatest indexed RVA ≤ query)
//! in O(log n) without loading the dump, plus three companion caches for
//! type-name → dump-offset lookup.
//!
//! Format guarantees (frozen at format version 3):
//! - All numeric fields are little-endian; never negotiated
//! - Dump offsets are 32-bit; dumps past 2^32 − 1 bytes are rejected outright
//! - IDX1 routing entries are sorted by start RVA; verified at load time
//! - Every IDX2 block obeys `16 + 8 × record_count == block_size`
//! - Intra-block RVA deltas fit 32 bits; the builder splits blocks to keep it
//! - Readers accept format v1–v3; the writer emits v3 only
//! - Companion caches degrade gracefully: a missing file means "no index"
//!
//! ```no_run
//! use std::path::Path;
//! use rvamap::{build_rva_index, BuildOptions, RvaLookup};
//!
//! build_rva_index(
//!     Path::new("dump.cs"),
//!     Path::new("dump.idx1"),
//!     Path::new("dump.idx2"),
//!     &BuildOptions::default(),
//! )?;
//!
//! let mut lookup = RvaLookup::open(Path::new("dump.idx1"), Path::new("dump.idx2"))?;
//! if let Some(offset) = lookup.find_floor(0x1B2C30)? {
//!     println!("method line starts at dump byte {offset}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod scan;
pub mod extract;
pub mod block;
pub mod routing;
pub mod writer;
pub mod lookup;
pub mod builder;
pub mod defs;

// Flat re-exports for the most common types.
pub use block::{pack_blocks, BlockError, DecodedBlock, IndexBlock, RvaRecord,
                DEFAULT_MAX_RECORDS_PER_BLOCK};
pub use builder::{build_rva_index, scan_records, BuildError, BuildOptions, BuildStats};
pub use defs::{build_definition_caches, scan_definitions, DefinitionScan, DumpMeta, TypeInfo};
pub use extract::extract_rva;
pub use lookup::{LoadError, LookupError, RvaLookup};
pub use routing::{RoutingEntry, RoutingError, FORMAT_VERSION};
pub use scan::{Line, LineScanner, ScanError, MAX_DUMP_SIZE};
pub use writer::write_index_files;
