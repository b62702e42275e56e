//! Line scanner — byte-accurate forward scan of a dump listing.
//!
//! The scanner walks the dump as raw bytes and yields one [`Line`] per `\n`
//! (plus a final unterminated line, if any).  `Line::offset` is the byte
//! position of the first byte of the line; offset accounting always includes
//! the terminator and any `\r`, while the emitted bytes have the `\n` and a
//! single trailing `\r` removed for downstream pattern matching.
//!
//! Offsets are stored as `u32` in every index format, so the scanner aborts
//! as soon as the cumulative byte count passes 2^32 − 1 — even for readers
//! whose size cannot be checked upfront.

use std::borrow::Cow;
use std::io::{self, BufRead};
use thiserror::Error;

/// Largest dump the index formats can address: offsets are `u32`.
pub const MAX_DUMP_SIZE: u64 = u32::MAX as u64;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("dump exceeds the {MAX_DUMP_SIZE}-byte addressing limit ({0} bytes consumed)")]
    DumpTooLarge(u64),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One dump line: `\n` excluded, a single trailing `\r` trimmed.
#[derive(Debug)]
pub struct Line<'a> {
    /// Byte offset of the first byte of the line within the dump.
    pub offset: u32,
    /// Line bytes for pattern matching.
    pub raw: &'a [u8],
}

impl Line<'_> {
    /// Lossy UTF-8 view for text consumers.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.raw)
    }
}

pub struct LineScanner<R> {
    reader: R,
    buf: Vec<u8>,
    next_offset: u64,
    lines: u32,
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            next_offset: 0,
            lines: 0,
        }
    }

    /// Lines emitted so far.  The final unterminated line counts.
    pub fn lines_emitted(&self) -> u32 {
        self.lines
    }

    /// Advance to the next line.  Returns `Ok(None)` at end of input.
    pub fn next_line(&mut self) -> Result<Option<Line<'_>>, ScanError> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)? as u64;
        if n == 0 {
            return Ok(None);
        }

        let start = self.next_offset;
        let end = start + n;
        if end > MAX_DUMP_SIZE {
            return Err(ScanError::DumpTooLarge(end));
        }
        self.next_offset = end;
        self.lines += 1;

        let mut line = self.buf.as_slice();
        if let [rest @ .., b'\n'] = line {
            line = rest;
        }
        if let [rest @ .., b'\r'] = line {
            line = rest;
        }
        Ok(Some(Line {
            offset: start as u32,
            raw: line,
        }))
    }
}
