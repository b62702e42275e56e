//! Index writer — serializes the block file (IDX2), then the routing table
//! (IDX1).
//!
//! IDX2 goes first so that every block's absolute byte offset is known when
//! the routing table is produced.  Offsets are tracked arithmetically from
//! the header size, so any plain `Write` sink works — including `Vec<u8>` in
//! tests.  Writing the same blocks twice yields byte-identical files.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::block::{IndexBlock, IDX2_MAGIC};
use crate::routing::{write_routing, RoutingEntry, FORMAT_VERSION};

/// Byte size of the IDX2 header (v1 lacks `total_dump_lines`).
pub fn idx2_header_size(version: u16) -> u64 {
    if version >= 2 {
        16
    } else {
        12
    }
}

/// Write both index files and return the routing entries that went into
/// IDX1.
///
/// `total_dump_lines` is the physical line count of the source dump,
/// recorded in the IDX2 header.
pub fn write_index_files<W1: Write, W2: Write>(
    idx1: W1,
    mut idx2: W2,
    blocks: &[IndexBlock],
    total_dump_lines: u32,
) -> io::Result<Vec<RoutingEntry>> {
    idx2.write_all(IDX2_MAGIC)?;
    idx2.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    idx2.write_u16::<LittleEndian>(0)?;
    idx2.write_u32::<LittleEndian>(blocks.len() as u32)?;
    idx2.write_u32::<LittleEndian>(total_dump_lines)?;

    let mut entries = Vec::with_capacity(blocks.len());
    let mut position = idx2_header_size(FORMAT_VERSION);
    for block in blocks {
        let size = block.byte_size();
        block.write(&mut idx2)?;
        entries.push(RoutingEntry {
            start_rva: block.start_rva,
            block_offset: position,
            block_size: size,
        });
        position += size as u64;
    }

    write_routing(idx1, &entries)?;
    Ok(entries)
}
