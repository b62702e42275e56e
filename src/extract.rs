//! RVA line patterns.
//!
//! Two annotations mark executable code in a dump, both anchored at
//! column 0:
//!
//! ```text
//! \t// RVA: 0x1B2C30 Offset: 0x1B2C30      ← method
//! \t|-RVA: 0x2F0A10                        ← generic instantiation
//! ```
//!
//! The method pattern is tried first; at most one record per line.  The hex
//! run parses case-insensitively as `u64`; a run that does not parse (for
//! example, more than 16 digits) skips the line silently, as does any line
//! matching neither pattern.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

static METHOD_RVA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\t// RVA:\s*0x([0-9A-Fa-f]+)\b").expect("method RVA pattern"));

static GENERIC_RVA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\t\|-RVA:\s*0x([0-9A-Fa-f]+)\b").expect("generic RVA pattern"));

/// Extract the RVA annotated on `line`, if any.
pub fn extract_rva(line: &[u8]) -> Option<u64> {
    let caps = METHOD_RVA
        .captures(line)
        .or_else(|| GENERIC_RVA.captures(line))?;
    let hex = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    u64::from_str_radix(hex, 16).ok()
}
