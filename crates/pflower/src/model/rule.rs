//! [`Match`], [`Action`] and [`Rule`]: the conjunction-of-predicates model.

use super::match_type::MatchType;
use crate::error::{Error, ParseErrorKind, Result};

/// Default cap on matches per rule (spec.md §3, N_MAX).
pub const N_MAX: usize = 6;

/// A comparison applied between a packet field and a match's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

/// Terminal verdict of a rule. Dialect-specific actions (`ACCEPT`,
/// `output`, ...) are mapped onto one of these two at parse time;
/// anything else fails parsing with `MissingAction`/`UnknownKeyword`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pass,
    Drop,
}

/// A single field predicate: `kind op value`, optionally masked.
///
/// Invariant: `value`'s significant bit-width equals
/// `kind.value_format().bit_width()`; unused high bits are zero. `mask`
/// has the same storage width as `value` and is only meaningful when
/// `use_mask` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub kind: MatchType,
    pub op: Comparison,
    value: [u8; 16],
    mask: [u8; 16],
    use_mask: bool,
}

impl Match {
    /// Build a match from up to 16 bytes of big-endian value bytes.
    /// `bytes` must not exceed the kind's declared storage width; any
    /// shorter prefix is zero-extended on the high (leading) side.
    pub fn new(kind: MatchType, op: Comparison, bytes: &[u8]) -> Result<Self> {
        let width = kind.value_format().byte_width();
        if bytes.len() > width {
            return Err(Error::InvalidArgument(format!(
                "value for {kind:?} exceeds its {width}-byte format"
            )));
        }
        let mut value = [0u8; 16];
        value[width - bytes.len()..width].copy_from_slice(bytes);
        Ok(Match {
            kind,
            op,
            value,
            mask: [0xff; 16],
            use_mask: false,
        })
    }

    pub fn with_mask(mut self, mask_bytes: &[u8]) -> Result<Self> {
        let width = self.kind.value_format().byte_width();
        if mask_bytes.len() > width {
            return Err(Error::InvalidArgument(format!(
                "mask for {:?} exceeds its {width}-byte format",
                self.kind
            )));
        }
        let mut mask = [0u8; 16];
        mask[width - mask_bytes.len()..width].copy_from_slice(mask_bytes);
        self.mask = mask;
        self.use_mask = true;
        Ok(self)
    }

    pub fn value_bytes(&self) -> &[u8] {
        let width = self.kind.value_format().byte_width();
        &self.value[16 - width..]
    }

    pub fn mask_bytes(&self) -> &[u8] {
        let width = self.kind.value_format().byte_width();
        &self.mask[16 - width..]
    }

    /// Full 16-byte zero-padded value, as stored in the persistence format.
    pub fn value_padded(&self) -> [u8; 16] {
        self.value
    }

    /// Full 16-byte zero-padded mask, as stored in the persistence format.
    pub fn mask_padded(&self) -> [u8; 16] {
        self.mask
    }

    pub fn use_mask(&self) -> bool {
        self.use_mask
    }
}

/// An ordered conjunction of matches plus a terminal action.
///
/// Invariant: `1 <= matches.len() <= N_MAX` (spec.md §3). All matches in
/// the ordered sequence must hold for the rule to apply (logical AND).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    matches: Vec<Match>,
    pub action: Action,
}

impl Rule {
    /// Build a rule from a non-empty, size-bounded match list.
    pub fn new(matches: Vec<Match>, action: Action) -> Result<Self> {
        Self::new_with_limit(matches, action, N_MAX)
    }

    pub fn new_with_limit(matches: Vec<Match>, action: Action, limit: usize) -> Result<Self> {
        if matches.is_empty() {
            return Err(Error::parse(
                "rule",
                "<empty>",
                ParseErrorKind::MissingAction,
            ));
        }
        if matches.len() > limit {
            return Err(Error::TooManyMatches {
                count: matches.len(),
                limit,
            });
        }
        Ok(Rule { matches, action })
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn uses_mask(&self) -> bool {
        self.matches.iter().any(Match::use_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_zero_extended_on_the_high_side() {
        let m = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &[0x00, 0x16]).unwrap();
        assert_eq!(m.value_bytes(), &[0x00, 0x16]);
        assert_eq!(m.value_padded()[14..], [0x00, 0x16]);
    }

    #[test]
    fn oversized_value_is_rejected() {
        let err = Match::new(MatchType::Ip4Ttl, Comparison::Equal, &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn mask_sets_use_mask_flag() {
        let m = Match::new(MatchType::Ip4Src, Comparison::Equal, &[10, 0, 0, 0])
            .unwrap()
            .with_mask(&[0xff, 0, 0, 0])
            .unwrap();
        assert!(m.use_mask());
        assert_eq!(m.mask_bytes(), &[0xff, 0, 0, 0]);
    }

    #[test]
    fn rule_rejects_empty_matches() {
        assert!(Rule::new(vec![], Action::Pass).is_err());
    }

    #[test]
    fn rule_rejects_too_many_matches() {
        let one = Match::new(MatchType::Ip4Ttl, Comparison::Equal, &[64]).unwrap();
        let matches = std::iter::repeat(one).take(N_MAX + 1).collect();
        let err = Rule::new(matches, Action::Drop).unwrap_err();
        assert!(matches!(err, Error::TooManyMatches { .. }));
    }
}
