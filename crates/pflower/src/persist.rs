//! Persistence (spec.md §6/SPEC_FULL.md §4.6): save a [`Filter`] to a
//! binary backup file and load it back.
//!
//! The wire format's integers are little-endian regardless of host
//! endianness, expressed with `zerocopy`'s `byteorder::little_endian`
//! wrapper types -- the same `zerocopy`-derived, `#[repr(C)]` style the
//! teacher uses for its netlink attribute/message headers, just backed by
//! explicit wire-endian integers instead of host-native ones, since this
//! format crosses process/host boundaries via a file rather than staying
//! within one machine's netlink socket.
//!
//! ```text
//! magic: u32        = 0x4B464C52 ("RLFK")
//! version: u16      = 1
//! rule_count: u32
//! rule_count x {
//!     dialect_tag: u8
//!     action: u8
//!     match_count: u8
//!     match_count x {
//!         kind: u16
//!         op: u8
//!         flags: u8
//!         value: [u8; 16]
//!         mask:  [u8; 16]
//!     }
//! }
//! ```

use std::io::{Read, Write};
use std::path::Path;

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{logged, Error, ParseErrorKind, Result};
use crate::filter::Filter;
use crate::model::{match_type, Action, Comparison, Match, MatchType, Rule};

const MAGIC: u32 = 0x4B46_4C52;
const VERSION: u16 = 1;

/// `dialect_tag` written when a `Rule`'s originating dialect isn't known
/// to the model (today, always -- see DESIGN.md's resolution of this
/// field, which the spec declares diagnostic-only and round-trip-inert).
const DIALECT_TAG_UNKNOWN: u8 = 0xff;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct FileHeader {
    magic: U32,
    version: U16,
    rule_count: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RuleHeader {
    dialect_tag: u8,
    action: u8,
    match_count: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct MatchRecord {
    kind: U16,
    op: u8,
    flags: u8,
    value: [u8; 16],
    mask: [u8; 16],
}

const FLAG_USE_MASK: u8 = 1 << 0;

/// Save `filter` to `path` in the versioned backup format above.
#[tracing::instrument(skip(filter))]
pub fn save(filter: &Filter, path: impl AsRef<Path>) -> Result<()> {
    logged(try_save(filter, path.as_ref()))
}

fn try_save(filter: &Filter, path: &Path) -> Result<()> {
    let mut out = Vec::new();
    let header = FileHeader {
        magic: U32::new(MAGIC),
        version: U16::new(VERSION),
        rule_count: U32::new(filter.len() as u32),
    };
    out.extend_from_slice(header.as_bytes());

    for rule in filter.rules() {
        let rule_header = RuleHeader {
            dialect_tag: DIALECT_TAG_UNKNOWN,
            action: action_tag(rule.action),
            match_count: rule.matches().len() as u8,
        };
        out.extend_from_slice(rule_header.as_bytes());

        for m in rule.matches() {
            let record = MatchRecord {
                kind: U16::new(match_type_id(m.kind)),
                op: comparison_tag(m.op),
                flags: if m.use_mask() { FLAG_USE_MASK } else { 0 },
                value: m.value_padded(),
                mask: m.mask_padded(),
            };
            out.extend_from_slice(record.as_bytes());
        }
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(&out)?;
    Ok(())
}

/// Load a `Filter` previously written by [`save`]. Round-trips to an
/// equal `Filter` (spec.md §8's round-trip property).
#[tracing::instrument]
pub fn load(path: impl AsRef<Path>) -> Result<Filter> {
    logged(try_load(path.as_ref()))
}

fn try_load(path: &Path) -> Result<Filter> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;

    let header_len = std::mem::size_of::<FileHeader>();
    if bytes.len() < header_len {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated pflower backup file header",
        )));
    }
    let header = FileHeader::read_from_bytes(&bytes[..header_len])
        .map_err(|_| invalid_file("header"))?;
    if header.magic.get() != MAGIC {
        return Err(invalid_file("magic"));
    }
    if header.version.get() != VERSION {
        return Err(invalid_file("version"));
    }

    let mut cursor = header_len;
    let mut filter = Filter::new();
    let rule_header_len = std::mem::size_of::<RuleHeader>();
    let match_record_len = std::mem::size_of::<MatchRecord>();

    for _ in 0..header.rule_count.get() {
        let rule_header = read_struct::<RuleHeader>(&bytes, &mut cursor, rule_header_len)?;
        let action = action_from_tag(rule_header.action)?;

        let mut matches = Vec::with_capacity(rule_header.match_count as usize);
        for _ in 0..rule_header.match_count {
            let record = read_struct::<MatchRecord>(&bytes, &mut cursor, match_record_len)?;
            let kind = match_type_from_id(record.kind.get())?;
            let op = comparison_from_tag(record.op)?;
            let width = kind.value_format().byte_width();
            let mut m = Match::new(kind, op, &record.value[16 - width..])?;
            if record.flags & FLAG_USE_MASK != 0 {
                m = m.with_mask(&record.mask[16 - width..])?;
            }
            matches.push(m);
        }

        let rule = Rule::new(matches, action)?;
        let index = filter.len() as i64;
        filter.insert(index, rule)?;
    }

    Ok(filter)
}

fn read_struct<T: FromBytes + KnownLayout + Immutable>(
    bytes: &[u8],
    cursor: &mut usize,
    len: usize,
) -> Result<T> {
    if bytes.len() < *cursor + len {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated pflower backup file record",
        )));
    }
    let value = T::read_from_bytes(&bytes[*cursor..*cursor + len]).map_err(|_| invalid_file("record"))?;
    *cursor += len;
    Ok(value)
}

fn invalid_file(what: &str) -> Error {
    Error::parse("persist", what, ParseErrorKind::MalformedValue)
}

fn action_tag(action: Action) -> u8 {
    match action {
        Action::Pass => 0,
        Action::Drop => 1,
    }
}

fn action_from_tag(tag: u8) -> Result<Action> {
    match tag {
        0 => Ok(Action::Pass),
        1 => Ok(Action::Drop),
        other => Err(Error::parse("persist", other.to_string(), ParseErrorKind::MalformedValue)),
    }
}

fn comparison_tag(op: Comparison) -> u8 {
    match op {
        Comparison::Equal => 0,
        Comparison::NotEqual => 1,
        Comparison::LessThan => 2,
        Comparison::LessOrEqual => 3,
        Comparison::GreaterThan => 4,
        Comparison::GreaterOrEqual => 5,
    }
}

fn comparison_from_tag(tag: u8) -> Result<Comparison> {
    match tag {
        0 => Ok(Comparison::Equal),
        1 => Ok(Comparison::NotEqual),
        2 => Ok(Comparison::LessThan),
        3 => Ok(Comparison::LessOrEqual),
        4 => Ok(Comparison::GreaterThan),
        5 => Ok(Comparison::GreaterOrEqual),
        other => Err(Error::parse("persist", other.to_string(), ParseErrorKind::MalformedValue)),
    }
}

/// `MatchType`'s position in [`match_type::ALL`] is a stable id: the
/// declaration order new variants are added in only grows the table, it
/// never reorders existing entries (spec.md §9's exhaustive-match
/// obligation already guards against silently skipping a variant there).
fn match_type_id(kind: MatchType) -> u16 {
    match_type::ALL.iter().position(|k| *k == kind).expect("every MatchType appears in ALL") as u16
}

fn match_type_from_id(id: u16) -> Result<MatchType> {
    match_type::ALL
        .get(id as usize)
        .copied()
        .ok_or_else(|| Error::parse("persist", id.to_string(), ParseErrorKind::MalformedValue))
}
