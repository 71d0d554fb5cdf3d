//! [`Filter`]: an ordered, index-addressable list of rules (spec.md §4.1).
//!
//! Re-architected from the teacher's domain (an open-coded kernel list
//! walked by netlink dump) into a plain `Vec<Rule>`: O(1) append, O(n)
//! mid-list insert/delete, index-addressable with stable iteration order.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::error::{logged, Error, Result};
use crate::model::{Action, Rule};

/// An ordered list of rules, evaluated in index order; the first matching
/// rule dictates the action (spec.md Glossary).
///
/// Filter exclusively owns its Rules. Cloning is deep and independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    rules: Vec<Rule>,
}

impl Filter {
    pub fn new() -> Self {
        Filter { rules: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Insert or replace a rule at `index`.
    ///
    /// - `index == len`: append.
    /// - `0 <= index < len`: replace in place.
    /// - `index < 0`: canonicalized to append.
    /// - `index > len`: `InvalidIndex`.
    #[tracing::instrument(skip(self, rule), fields(index, len = self.rules.len()))]
    pub fn insert(&mut self, index: i64, rule: Rule) -> Result<usize> {
        logged(self.try_insert(index, rule))
    }

    fn try_insert(&mut self, index: i64, rule: Rule) -> Result<usize> {
        let len = self.rules.len();
        if index < 0 {
            self.rules.push(rule);
            return Ok(len);
        }
        let index = index as usize;
        if index == len {
            self.rules.push(rule);
            Ok(index)
        } else if index < len {
            self.rules[index] = rule;
            Ok(index)
        } else {
            Err(Error::InvalidIndex(index))
        }
    }

    /// Remove the rule at `index`; subsequent rules shift down.
    #[tracing::instrument(skip(self), fields(index, len = self.rules.len()))]
    pub fn delete(&mut self, index: usize) -> Result<Rule> {
        logged(self.try_delete(index))
    }

    fn try_delete(&mut self, index: usize) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(Error::InvalidIndex(index));
        }
        Ok(self.rules.remove(index))
    }

    /// Write a human-readable listing, one rule per line, in index order.
    pub fn dump<W: Write>(&self, mut sink: W) -> io::Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            writeln!(sink, "{}", format_rule(i, rule))?;
        }
        Ok(())
    }

    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let _ = writeln!(out, "{}", format_rule(i, rule));
        }
        out
    }
}

fn format_rule(index: usize, rule: &Rule) -> String {
    let action = match rule.action {
        Action::Pass => "pass",
        Action::Drop => "drop",
    };
    let mut parts = Vec::with_capacity(rule.matches().len());
    for m in rule.matches() {
        let hex: String = m.value_bytes().iter().map(|b| format!("{b:02x}")).collect();
        if m.use_mask() {
            let mask_hex: String = m.mask_bytes().iter().map(|b| format!("{b:02x}")).collect();
            parts.push(format!("{:?}={hex}/{mask_hex}", m.kind));
        } else {
            parts.push(format!("{:?}={hex}", m.kind));
        }
    }
    format!("[{index}] {} -> {action}", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparison, Match, MatchType};

    fn sample_rule(port: u16, action: Action) -> Rule {
        let m = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &port.to_be_bytes()).unwrap();
        Rule::new(vec![m], action).unwrap()
    }

    #[test]
    fn append_via_len_index() {
        let mut f = Filter::new();
        let idx = f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn negative_index_canonicalizes_to_append() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        let idx = f.insert(-1, sample_rule(80, Action::Pass)).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn insert_past_len_is_invalid_index() {
        let mut f = Filter::new();
        let err = f.insert(5, sample_rule(22, Action::Drop)).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(5)));
    }

    #[test]
    fn insert_in_range_replaces() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        f.insert(0, sample_rule(443, Action::Pass)).unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rule(0).unwrap().action, Action::Pass);
    }

    /// `insert` at an occupied index replaces that slot's rule in place
    /// rather than shifting it down (see DESIGN.md's resolution of the
    /// insert/shift ambiguity between spec.md §4.1 and §8 scenario 5).
    #[test]
    fn insert_at_occupied_index_replaces_not_shifts() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        f.insert(0, sample_rule(80, Action::Pass)).unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rule(0).unwrap().action, Action::Pass);
    }

    #[test]
    fn delete_out_of_range_is_invalid_index() {
        let mut f = Filter::new();
        let err = f.delete(0).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(0)));
    }

    #[test]
    fn insert_then_delete_leaves_filter_unchanged() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        let before = f.clone();
        f.insert(f.len() as i64, sample_rule(443, Action::Pass))
            .unwrap();
        f.delete(f.len() - 1).unwrap();
        assert_eq!(f, before);
    }

    #[test]
    fn clone_is_independent() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        let clone = f.clone();
        f.insert(1, sample_rule(80, Action::Pass)).unwrap();
        assert_eq!(clone.len(), 1);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn dump_lists_rules_in_index_order() {
        let mut f = Filter::new();
        f.insert(0, sample_rule(22, Action::Drop)).unwrap();
        f.insert(1, sample_rule(443, Action::Pass)).unwrap();
        let text = f.dump_to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[0]"));
        assert!(lines[1].starts_with("[1]"));
    }
}
