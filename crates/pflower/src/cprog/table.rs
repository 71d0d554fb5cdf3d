//! Runtime Table Builder (spec.md §4.5): serializes a Filter's rules into
//! the key/value layout the emitted program reads at classification time.
//!
//! Entry layout mirrors [`super::schema::build`] field-for-field: each
//! rule's matches are scattered into the schema's field slots (missing
//! fields stay zero, matching the emitter's "dead fields are permitted"
//! allowance), then the record is `key bytes | mask bytes | action byte`,
//! exactly the "packed key + mask + action" order spec.md §4.5 specifies.
//! Because the field set is Filter-dependent, no single compile-time
//! `#[repr(C)]` struct can back every entry (see schema.rs's own note);
//! each entry is instead a plain byte buffer whose offsets are derived
//! from the same [`super::schema::KeyField`] list the emitter renders.

use crate::cprog::schema::{self, KeyField};
use crate::filter::Filter;
use crate::model::{Action, Rule};

/// One rule, serialized to the layout the generated program's lookup
/// table expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub index: usize,
    /// Concatenated match values, one slot per [`KeyField`], schema order.
    pub key: Vec<u8>,
    /// Concatenated match masks, same order and widths as `key`.
    pub mask: Vec<u8>,
    pub action: Action,
}

impl TableEntry {
    /// Serialize this entry to its wire form: `key || mask || action`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.key.len() + self.mask.len() + 1);
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.mask);
        out.push(if self.action == Action::Pass { 0 } else { 1 });
        out
    }
}

/// Build one [`TableEntry`] per rule in `filter`, index-ascending, using
/// `schema` (as returned by [`schema::build`]) to place each rule's
/// matches into the record's field slots.
pub fn build(filter: &Filter, schema: &[KeyField]) -> Vec<TableEntry> {
    filter
        .rules()
        .iter()
        .enumerate()
        .map(|(index, rule)| build_entry(index, rule, schema))
        .collect()
}

fn build_entry(index: usize, rule: &Rule, schema: &[KeyField]) -> TableEntry {
    let total = schema::total_width(schema);
    let mut key = vec![0u8; total];
    let mut mask = vec![0u8; total];

    for field in schema {
        // A rule that never references this schema field leaves it zero
        // in both key and mask: an all-zero mask makes the comparison
        // `(pkt & 0) op (0 & 0)` trivially true, so absent fields never
        // constrain a match (spec.md §4.4 step 6's masked-comparison form).
        if let Some(m) = rule.matches().iter().find(|m| m.kind == field.kind) {
            key[field.offset..field.offset + field.width].copy_from_slice(m.value_bytes());
            if m.use_mask() {
                mask[field.offset..field.offset + field.width].copy_from_slice(m.mask_bytes());
            } else {
                mask[field.offset..field.offset + field.width].fill(0xff);
            }
        }
    }

    TableEntry {
        index,
        key,
        mask,
        action: rule.action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparison, Match, MatchType};

    #[test]
    fn entry_count_matches_rule_count() {
        let mut f = Filter::new();
        let m = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        f.insert(0, Rule::new(vec![m], Action::Drop).unwrap()).unwrap();
        let schema = schema::build(&f);
        let entries = build(&f, &schema);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, Action::Drop);
    }

    #[test]
    fn absent_field_is_zero_key_and_mask() {
        let mut f = Filter::new();
        let dst = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        let src = Match::new(MatchType::EthSrc, Comparison::Equal, &[1, 2, 3, 4, 5, 6]).unwrap();
        f.insert(0, Rule::new(vec![dst], Action::Drop).unwrap()).unwrap();
        f.insert(1, Rule::new(vec![src], Action::Pass).unwrap()).unwrap();

        let schema = schema::build(&f);
        let entries = build(&f, &schema);
        let eth_field = schema.iter().find(|f| f.kind == MatchType::EthSrc).unwrap();
        // entry 0 doesn't reference EthSrc: its slot is zero in both key and mask.
        assert!(entries[0].key[eth_field.offset..eth_field.offset + eth_field.width]
            .iter()
            .all(|b| *b == 0));
        assert!(entries[0].mask[eth_field.offset..eth_field.offset + eth_field.width]
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn masked_match_carries_its_own_mask_bytes() {
        let mut f = Filter::new();
        let m = Match::new(MatchType::Ip4Src, Comparison::Equal, &[10, 0, 0, 0])
            .unwrap()
            .with_mask(&[0xff, 0, 0, 0])
            .unwrap();
        f.insert(0, Rule::new(vec![m], Action::Pass).unwrap()).unwrap();

        let schema = schema::build(&f);
        let entries = build(&f, &schema);
        let field = schema.iter().find(|f| f.kind == MatchType::Ip4Src).unwrap();
        assert_eq!(
            &entries[0].mask[field.offset..field.offset + field.width],
            &[0xff, 0, 0, 0]
        );
    }

    #[test]
    fn to_bytes_is_key_then_mask_then_action() {
        let entry = TableEntry {
            index: 0,
            key: vec![1, 2],
            mask: vec![0xff, 0xff],
            action: Action::Drop,
        };
        assert_eq!(entry.to_bytes(), vec![1, 2, 0xff, 0xff, 1]);
    }
}
