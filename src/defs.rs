//! Definition and type-header companion indexes.
//!
//! A dump interleaves namespace markers, type headers, and method bodies:
//!
//! ```text
//! // Namespace: System.Collections
//! public class Hashtable : ICollection, IDictionary // TypeDefIndex: 4213
//! {
//!     // RVA annotations and members follow...
//! ```
//!
//! One pass over the dump produces three companion outputs:
//!
//! - a **text definition cache** (`v2` header line, then `D\t<word>\t<offsetHex>`
//!   lines in ordinal word order),
//! - a **binary namespace-offsets file** listing every `// Namespace:` line,
//! - a **binary type-index file** with one record per parsed type header.
//!
//! The binary files carry the dump's size and mtime (unix seconds) so a
//! consumer can detect a stale cache.  Either value not fitting the on-disk
//! `u32` skips the binary files — the consumer treats absence as "no index".
//! The header recognizer is intentionally shallow (keyword + name token);
//! multi-line or exotic formatter output is best-effort.

use byteorder::{LittleEndian, WriteBytesExt};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::builder::BuildError;
use crate::scan::{LineScanner, ScanError, MAX_DUMP_SIZE};

/// Magic of the namespace-offsets file ("NIS1" on disk).
pub const NAMESPACE_MAGIC: u32 = 0x3153_494E;

/// Magic of the type-index file.
pub const TYPE_INDEX_MAGIC: u32 = 0x3259_5054;

const NAMESPACE_MARKER: &str = "// Namespace:";
const TYPE_DEF_MARKER: &str = "TypeDefIndex:";
const TYPE_DEF_COMMENT: &str = "// TypeDefIndex:";
const PUBLIC_WORDS: [&str; 3] = ["public class ", "public struct ", "public enum "];

/// One parsed type header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Byte offset of the header line within the dump.
    pub offset: u32,
    pub type_name: String,
    /// `namespace.type_name`, or just `type_name` outside any namespace.
    pub full_name: String,
    pub base_name: String,
    pub namespace: String,
}

/// Everything one definition scan accumulates.
#[derive(Debug, Default)]
pub struct DefinitionScan {
    /// Definition word → line-start offsets, sorted and deduplicated.
    pub definitions: BTreeMap<String, Vec<u32>>,
    /// Offsets of `// Namespace:` marker lines, sorted and deduplicated.
    pub namespace_offsets: Vec<u32>,
    /// Parsed type headers, ascending by offset.
    pub types: Vec<TypeInfo>,
}

// ── Tokenizing and normalization ─────────────────────────────────────────────

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '<' | '>' | '`')
}

/// Greedy name token: skip leading non-name characters, take the run.
fn name_token(s: &str) -> &str {
    let Some(start) = s.find(is_name_char) else {
        return "";
    };
    let rest = &s[start..];
    let end = rest.find(|c| !is_name_char(c)).unwrap_or(rest.len());
    &rest[..end]
}

/// Normalize a raw type-name token into a lookup key.
///
/// Array suffixes are preserved through the cleanup: `global::Foo[][]`
/// normalizes to `Foo[][]`.
pub fn normalize_type_name(raw: &str) -> String {
    let mut s = raw.trim();
    let mut dims = 0usize;
    while let Some(stripped) = s.strip_suffix("[]") {
        s = stripped;
        dims += 1;
    }
    let token = name_token(s);
    let token = token.strip_prefix("global::").unwrap_or(token);
    let token = token.trim_end_matches([',', ';']);

    let mut name = String::with_capacity(token.len() + 2 * dims);
    name.push_str(token);
    for _ in 0..dims {
        name.push_str("[]");
    }
    name
}

// ── Type header parsing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Class,
    Struct,
    Enum,
    Interface,
}

const TYPE_KEYWORDS: [(&str, TypeKind); 4] = [
    (" class ", TypeKind::Class),
    (" struct ", TypeKind::Struct),
    (" enum ", TypeKind::Enum),
    (" interface ", TypeKind::Interface),
];

fn default_base(kind: TypeKind) -> String {
    match kind {
        TypeKind::Struct => "System.ValueType".to_owned(),
        TypeKind::Enum => "System.Enum".to_owned(),
        TypeKind::Class | TypeKind::Interface => String::new(),
    }
}

/// Shallow parse of one type-header line (already trimmed).
fn parse_type_header(trimmed: &str, namespace: &str, offset: u32) -> Option<TypeInfo> {
    let head = match trimmed.find(TYPE_DEF_COMMENT) {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };

    let (kind, after) = TYPE_KEYWORDS.iter().find_map(|&(kw, kind)| {
        head.find(kw).map(|pos| (kind, &head[pos + kw.len()..]))
    })?;

    let name_start = after.find(is_name_char)?;
    let rest = &after[name_start..];
    let name_len = rest.find(|c| !is_name_char(c)).unwrap_or(rest.len());
    let raw_name = &rest[..name_len];
    let tail = &rest[name_len..];

    let type_name = normalize_type_name(raw_name);
    if type_name.is_empty() {
        return None;
    }

    let base_name = match tail.find(':') {
        Some(pos) => {
            let base = &tail[pos + 1..];
            let end = base.find([',', '{']).unwrap_or(base.len());
            normalize_type_name(&base[..end])
        }
        None => default_base(kind),
    };

    let full_name = if namespace.is_empty() {
        type_name.clone()
    } else {
        format!("{namespace}.{type_name}")
    };

    Some(TypeInfo {
        offset,
        type_name,
        full_name,
        base_name,
        namespace: namespace.to_owned(),
    })
}

// ── Scan ─────────────────────────────────────────────────────────────────────

/// Single-pass definition scan over a dump.
///
/// The three recognizers are independent: a `public class` header carrying a
/// `TypeDefIndex:` comment feeds both the definition map and the type list.
pub fn scan_definitions<R: BufRead>(reader: R) -> Result<DefinitionScan, ScanError> {
    let mut scanner = LineScanner::new(reader);
    let mut out = DefinitionScan::default();
    let mut current_namespace = String::new();

    while let Some(line) = scanner.next_line()? {
        let text = line.text();
        let trimmed = text.trim();

        if let Some(rest) = trimmed.strip_prefix(NAMESPACE_MARKER) {
            out.namespace_offsets.push(line.offset);
            current_namespace = rest.trim().to_owned();
        }

        for word in PUBLIC_WORDS {
            if let Some(rest) = trimmed.strip_prefix(word) {
                let token = name_token(rest);
                if !token.is_empty() {
                    out.definitions
                        .entry(token.to_owned())
                        .or_default()
                        .push(line.offset);
                }
                break;
            }
        }

        if trimmed.contains(TYPE_DEF_MARKER) {
            if let Some(info) = parse_type_header(trimmed, &current_namespace, line.offset) {
                out.types.push(info);
            }
        }
    }

    for offsets in out.definitions.values_mut() {
        offsets.sort_unstable();
        offsets.dedup();
    }
    out.namespace_offsets.sort_unstable();
    out.namespace_offsets.dedup();
    out.types.sort_by_key(|t| t.offset);
    Ok(out)
}

// ── Staleness metadata ───────────────────────────────────────────────────────

/// Dump size and mtime, recorded for staleness detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpMeta {
    pub size: u64,
    /// Modification time in unix seconds (0 when the epoch is unreachable).
    pub mtime: u64,
}

impl DumpMeta {
    /// Read size and mtime from the dump file.
    pub fn probe(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            size: meta.len(),
            mtime,
        })
    }

    /// Both fields as the on-disk `u32`s, when they fit.
    pub fn as_u32(&self) -> Option<(u32, u32)> {
        Some((
            u32::try_from(self.size).ok()?,
            u32::try_from(self.mtime).ok()?,
        ))
    }
}

// ── Writers ──────────────────────────────────────────────────────────────────

/// Write the text definition cache: one header line, then one `D` line per
/// (word, offset) pair in ordinal word order, ties by offset ascending.
pub fn write_definition_cache<W: Write>(
    mut w: W,
    definitions: &BTreeMap<String, Vec<u32>>,
    meta: DumpMeta,
) -> io::Result<()> {
    writeln!(w, "v2\t{:X}\t{:X}", meta.size, meta.mtime)?;
    for (word, offsets) in definitions {
        for offset in offsets {
            writeln!(w, "D\t{word}\t{offset:X}")?;
        }
    }
    Ok(())
}

/// Write the binary namespace-offsets file.  `offsets` must already be
/// sorted and deduplicated.
pub fn write_namespace_offsets<W: Write>(
    mut w: W,
    offsets: &[u32],
    dump_size: u32,
    dump_mtime: u32,
) -> io::Result<()> {
    w.write_u32::<LittleEndian>(NAMESPACE_MAGIC)?;
    w.write_u32::<LittleEndian>(dump_size)?;
    w.write_u32::<LittleEndian>(dump_mtime)?;
    w.write_u32::<LittleEndian>(offsets.len() as u32)?;
    for &offset in offsets {
        w.write_u32::<LittleEndian>(offset)?;
    }
    Ok(())
}

/// Write the binary type-index file.  Strings are length-prefixed UTF-8
/// without terminators.
pub fn write_type_index<W: Write>(
    mut w: W,
    types: &[TypeInfo],
    dump_size: u32,
    dump_mtime: u32,
) -> io::Result<()> {
    w.write_u32::<LittleEndian>(TYPE_INDEX_MAGIC)?;
    w.write_u32::<LittleEndian>(dump_size)?;
    w.write_u32::<LittleEndian>(dump_mtime)?;
    w.write_u32::<LittleEndian>(types.len() as u32)?;
    for t in types {
        w.write_u32::<LittleEndian>(t.offset)?;
        write_str(&mut w, &t.type_name)?;
        write_str(&mut w, &t.full_name)?;
        write_str(&mut w, &t.base_name)?;
        write_str(&mut w, &t.namespace)?;
    }
    Ok(())
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())
}

// ── Facade ───────────────────────────────────────────────────────────────────

/// Scan `dump` and write the three companion files.
///
/// The text cache is always written.  The binary companions are skipped —
/// not an error — when the dump metadata does not fit 32 bits; the type
/// index is also skipped when no type headers were found.
pub fn build_definition_caches(
    dump: &Path,
    cache_path: &Path,
    namespace_path: &Path,
    type_index_path: &Path,
) -> Result<DefinitionScan, BuildError> {
    let meta = DumpMeta::probe(dump)?;
    if meta.size > MAX_DUMP_SIZE {
        return Err(BuildError::DumpTooLarge(meta.size));
    }

    let scan = scan_definitions(BufReader::new(File::open(dump)?))?;

    let mut cache = BufWriter::new(File::create(cache_path)?);
    write_definition_cache(&mut cache, &scan.definitions, meta)?;
    cache.flush()?;

    match meta.as_u32() {
        None => warn!(
            "dump metadata for {} does not fit in 32 bits; skipping binary companions",
            dump.display()
        ),
        Some((size, mtime)) => {
            let mut ns = BufWriter::new(File::create(namespace_path)?);
            write_namespace_offsets(&mut ns, &scan.namespace_offsets, size, mtime)?;
            ns.flush()?;

            if scan.types.is_empty() {
                info!("no type headers in {}; skipping type index", dump.display());
            } else {
                let mut ti = BufWriter::new(File::create(type_index_path)?);
                write_type_index(&mut ti, &scan.types, size, mtime)?;
                ti.flush()?;
            }
        }
    }

    info!(
        "definition caches for {}: {} words, {} namespaces, {} types",
        dump.display(),
        scan.definitions.len(),
        scan.namespace_offsets.len(),
        scan.types.len()
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_token_skips_leading_garbage() {
        assert_eq!(name_token("  [Attr] Foo.Bar`1<T> rest"), "Attr");
        assert_eq!(name_token("= Foo,"), "Foo");
        assert_eq!(name_token("***"), "");
    }

    #[test]
    fn normalize_plain_and_prefixed_names() {
        assert_eq!(normalize_type_name("  Foo.Bar "), "Foo.Bar");
        assert_eq!(normalize_type_name("global::Foo"), "Foo");
        assert_eq!(normalize_type_name("List`1<Int32>"), "List`1<Int32>");
    }

    #[test]
    fn normalize_preserves_array_dimensions() {
        assert_eq!(normalize_type_name("Byte[]"), "Byte[]");
        assert_eq!(normalize_type_name("global::Foo[][]"), "Foo[][]");
    }

    #[test]
    fn parse_class_with_bases() {
        let info = parse_type_header(
            "public class Hashtable : ICollection, IDictionary // TypeDefIndex: 4213",
            "System.Collections",
            128,
        )
        .unwrap();
        assert_eq!(info.type_name, "Hashtable");
        assert_eq!(info.full_name, "System.Collections.Hashtable");
        assert_eq!(info.base_name, "ICollection");
        assert_eq!(info.namespace, "System.Collections");
        assert_eq!(info.offset, 128);
    }

    #[test]
    fn parse_struct_and_enum_default_bases() {
        let s = parse_type_header("public struct Vector3 // TypeDefIndex: 110", "UnityEngine", 0)
            .unwrap();
        assert_eq!(s.base_name, "System.ValueType");

        let e = parse_type_header("internal enum Flags // TypeDefIndex: 5", "", 0).unwrap();
        assert_eq!(e.base_name, "System.Enum");
        assert_eq!(e.full_name, "Flags");
    }

    #[test]
    fn parse_interface_has_empty_default_base() {
        let i = parse_type_header("public interface IDisposable // TypeDefIndex: 9", "System", 0)
            .unwrap();
        assert_eq!(i.base_name, "");
        assert_eq!(i.full_name, "System.IDisposable");
    }

    #[test]
    fn keyword_order_prefers_class() {
        // " class " wins even when another keyword appears later.
        let info =
            parse_type_header("public class EnumBox : Enum // TypeDefIndex: 7", "", 0).unwrap();
        assert_eq!(info.type_name, "EnumBox");
        assert_eq!(info.base_name, "Enum");
    }

    #[test]
    fn base_stops_at_comma_or_brace() {
        let info = parse_type_header(
            "public class A : global::B, C { // TypeDefIndex: 1",
            "",
            0,
        )
        .unwrap();
        assert_eq!(info.base_name, "B");
    }

    #[test]
    fn lines_without_keyword_are_ignored() {
        assert!(parse_type_header("// TypeDefIndex: 99", "", 0).is_none());
        assert!(parse_type_header("classless TypeDefIndex: 1", "", 0).is_none());
    }

    #[test]
    fn scan_tracks_namespaces_and_definitions() {
        let dump = b"\
// Namespace: System\n\
public class String // TypeDefIndex: 10\n\
{\n\
// Namespace: \n\
public struct Unscoped // TypeDefIndex: 11\n";
        let scan = scan_definitions(&dump[..]).unwrap();

        assert_eq!(scan.namespace_offsets, vec![0, 63]);
        assert_eq!(scan.definitions["String"], vec![21]);
        assert_eq!(scan.definitions["Unscoped"], vec![78]);

        assert_eq!(scan.types.len(), 2);
        assert_eq!(scan.types[0].full_name, "System.String");
        assert_eq!(scan.types[1].full_name, "Unscoped");
        assert_eq!(scan.types[1].namespace, "");
    }

    #[test]
    fn repeated_definition_words_accumulate_offsets() {
        let dump = b"public class Foo\npublic class Foo\n";
        let scan = scan_definitions(&dump[..]).unwrap();
        assert_eq!(scan.definitions["Foo"], vec![0, 17]);
    }

    #[test]
    fn definition_cache_layout() {
        let mut defs: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        defs.insert("Beta".into(), vec![0x20]);
        defs.insert("Alpha".into(), vec![0x10, 0xFF]);

        let mut out = Vec::new();
        let meta = DumpMeta { size: 0xABCD, mtime: 0x1234 };
        write_definition_cache(&mut out, &defs, meta).unwrap();
        assert_eq!(
            out,
            b"v2\tABCD\t1234\nD\tAlpha\t10\nD\tAlpha\tFF\nD\tBeta\t20\n"
        );
    }

    #[test]
    fn namespace_offsets_layout() {
        let mut out = Vec::new();
        write_namespace_offsets(&mut out, &[0x10, 0x20], 100, 200).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"NIS1");
        expected.extend_from_slice(&100u32.to_le_bytes());
        expected.extend_from_slice(&200u32.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&0x10u32.to_le_bytes());
        expected.extend_from_slice(&0x20u32.to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn type_index_layout() {
        let types = vec![TypeInfo {
            offset: 7,
            type_name: "Foo".into(),
            full_name: "N.Foo".into(),
            base_name: "".into(),
            namespace: "N".into(),
        }];
        let mut out = Vec::new();
        write_type_index(&mut out, &types, 1, 2).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&TYPE_INDEX_MAGIC.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(&7u32.to_le_bytes());
        for s in ["Foo", "N.Foo", "", "N"] {
            expected.extend_from_slice(&(s.len() as u32).to_le_bytes());
            expected.extend_from_slice(s.as_bytes());
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn meta_fits_u32() {
        assert_eq!(DumpMeta { size: 1, mtime: 2 }.as_u32(), Some((1, 2)));
        assert_eq!(DumpMeta { size: 1, mtime: u64::MAX }.as_u32(), None);
    }
}
