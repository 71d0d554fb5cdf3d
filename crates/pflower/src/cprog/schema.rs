//! The key-record field schema shared, bit-for-bit, by the Code Emitter's
//! generated C struct and the Runtime Table Builder's entry layout
//! (spec.md §4.5's "must agree bit-for-bit" invariant).
//!
//! A Filter's referenced MatchTypes vary at runtime, so no single
//! compile-time Rust struct can model the key record directly; instead
//! both consumers call [`build`] and walk the same `Vec<KeyField>`, which
//! guarantees agreement structurally rather than by a shared `#[repr]`.

use crate::filter::Filter;
use crate::model::{MatchType, ValueFormat};

/// One field of the generated key record: a MatchType, its byte offset
/// within the packed record, and its storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
    pub kind: MatchType,
    pub offset: usize,
    pub width: usize,
}

/// Builds the key schema for `filter`: one field per distinct MatchType
/// referenced by any rule, in [`MatchType::ALL`] declaration order (stable
/// across runs regardless of rule or match order, per spec.md §4.4's
/// determinism requirement).
pub fn build(filter: &Filter) -> Vec<KeyField> {
    let mut present = [false; crate::model::match_type::ALL.len()];
    for rule in filter.rules() {
        for m in rule.matches() {
            if let Some(idx) = crate::model::match_type::ALL.iter().position(|k| *k == m.kind) {
                present[idx] = true;
            }
        }
    }

    let mut offset = 0;
    let mut fields = Vec::new();
    for (idx, kind) in crate::model::match_type::ALL.iter().enumerate() {
        if !present[idx] {
            continue;
        }
        let width = value_width(*kind);
        fields.push(KeyField {
            kind: *kind,
            offset,
            width,
        });
        offset += width;
    }
    fields
}

fn value_width(kind: MatchType) -> usize {
    let format: ValueFormat = kind.value_format();
    format.byte_width()
}

/// Total byte width of a key record built from `fields`.
pub fn total_width(fields: &[KeyField]) -> usize {
    fields.iter().map(|f| f.width).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Comparison, Match, Rule};

    #[test]
    fn schema_orders_fields_by_declaration_order_not_rule_order() {
        let mut f = Filter::new();
        let dst = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        let src = Match::new(MatchType::EthSrc, Comparison::Equal, &[1, 2, 3, 4, 5, 6]).unwrap();
        f.insert(0, Rule::new(vec![dst, src], Action::Drop).unwrap())
            .unwrap();

        let schema = build(&f);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].kind, MatchType::EthSrc);
        assert_eq!(schema[1].kind, MatchType::Ip4L4Dst);
    }

    #[test]
    fn duplicate_match_type_across_rules_appears_once() {
        let mut f = Filter::new();
        let a = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        let b = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &80u16.to_be_bytes()).unwrap();
        f.insert(0, Rule::new(vec![a], Action::Drop).unwrap()).unwrap();
        f.insert(1, Rule::new(vec![b], Action::Pass).unwrap()).unwrap();

        let schema = build(&f);
        assert_eq!(schema.len(), 1);
    }
}
