//! Requirements Analyzer (spec.md §4.3): a pure function from a Filter
//! (plus caller overrides) to the protocol-decode and helper flags the
//! emitted program must carry.

use crate::cprog::{Helpers, Needs, OptionOverrides};
use crate::filter::Filter;
use crate::model::MatchType;

/// Computes `(needs, match_count, helpers)` for `filter`, folding in
/// `overrides`. Determinism: depends only on `filter`'s contents and the
/// override flags (spec.md §4.3).
pub fn analyze(filter: &Filter, overrides: &OptionOverrides) -> (Needs, usize, Helpers) {
    let mut needs = Needs::empty();
    let mut match_count = 0;
    let mut uses_ipv4_l4 = false;
    let mut uses_ipv6_l4 = false;

    for rule in filter.rules() {
        match_count = match_count.max(rule.matches().len());
        for m in rule.matches() {
            let kind = m.kind;

            if kind.needs_ethernet() {
                needs |= Needs::ETHERNET;
            }
            if kind.needs_ipv4() {
                needs |= Needs::ETHERNET | Needs::IPV4;
            }
            if kind.needs_ipv6() {
                needs |= Needs::ETHERNET | Needs::IPV6;
            }
            if kind.needs_l4_window() {
                needs |= Needs::L4_WINDOW;
            }
            if kind.needs_cvlan() {
                needs |= Needs::CVLAN;
            }
            if kind.needs_svlan() {
                needs |= Needs::SVLAN;
            }
            if m.use_mask() {
                needs |= Needs::USE_MASKS;
            }

            if matches!(kind, MatchType::Ip4L4Proto) {
                uses_ipv4_l4 = true;
                protocol_flag(&mut needs, m.value_bytes());
            }
            if matches!(kind, MatchType::Ip6L4Proto) {
                uses_ipv6_l4 = true;
                protocol_flag(&mut needs, m.value_bytes());
            }
        }
    }
    let _ = (uses_ipv4_l4, uses_ipv6_l4);

    if overrides.inline_match {
        needs |= Needs::INLINE_MATCH;
    }
    if overrides.no_loops {
        needs |= Needs::NO_LOOPS;
    }
    if overrides.no_vlan {
        needs |= Needs::NO_VLAN;
        needs.remove(Needs::CVLAN | Needs::SVLAN);
    }
    if overrides.debug_print {
        needs |= Needs::DEBUG_PRINT;
    }
    if overrides.cloned_filter {
        needs |= Needs::CLONED_FILTER;
    }

    let mut helpers = Helpers::MAP_LOOKUP;
    if needs.contains(Needs::DEBUG_PRINT) {
        helpers |= Helpers::DEBUG_PRINT;
    }

    (needs, match_count, helpers)
}

/// Maps a protocol-number byte (carried in an `Ip{4,6}L4Proto` match's
/// value) to its TCP/UDP/SCTP decode flag, when it names one of those
/// protocols.
fn protocol_flag(needs: &mut Needs, value: &[u8]) {
    match value.first() {
        Some(6) => *needs |= Needs::TCP,
        Some(17) => *needs |= Needs::UDP,
        Some(132) => *needs |= Needs::SCTP,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Comparison, Match, Rule};

    #[test]
    fn tcp_port_rule_sets_ethernet_ipv4_tcp_and_l4_window() {
        let mut f = Filter::new();
        let proto = Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[6]).unwrap();
        let port = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        f.insert(0, Rule::new(vec![proto, port], Action::Drop).unwrap())
            .unwrap();

        let (needs, match_count, helpers) = analyze(&f, &OptionOverrides::default());
        assert!(needs.contains(Needs::ETHERNET | Needs::IPV4 | Needs::TCP | Needs::L4_WINDOW));
        assert_eq!(match_count, 2);
        assert!(helpers.contains(Helpers::MAP_LOOKUP));
        assert!(!helpers.contains(Helpers::DEBUG_PRINT));
    }

    #[test]
    fn mask_use_sets_use_masks_flag() {
        let mut f = Filter::new();
        let m = Match::new(MatchType::Ip4Src, Comparison::Equal, &[10, 0, 0, 0])
            .unwrap()
            .with_mask(&[255, 0, 0, 0])
            .unwrap();
        f.insert(0, Rule::new(vec![m], Action::Pass).unwrap()).unwrap();

        let (needs, ..) = analyze(&f, &OptionOverrides::default());
        assert!(needs.contains(Needs::USE_MASKS));
    }

    #[test]
    fn cloned_filter_override_sets_flag() {
        let f = Filter::new();
        let overrides = OptionOverrides {
            cloned_filter: true,
            ..Default::default()
        };
        let (needs, ..) = analyze(&f, &overrides);
        assert!(needs.contains(Needs::CLONED_FILTER));
    }

    #[test]
    fn no_vlan_override_clears_vlan_flags() {
        let mut f = Filter::new();
        let m = Match::new(MatchType::VlanId, Comparison::Equal, &[0, 10]).unwrap();
        f.insert(0, Rule::new(vec![m], Action::Pass).unwrap()).unwrap();

        let overrides = OptionOverrides {
            no_vlan: true,
            ..Default::default()
        };
        let (needs, ..) = analyze(&f, &overrides);
        assert!(!needs.contains(Needs::CVLAN));
        assert!(!needs.contains(Needs::SVLAN));
        assert!(needs.contains(Needs::NO_VLAN));
    }
}
