//! ethtool n-tuple dialect (spec.md §4.2).
//!
//! `flow-type {tcp4|udp4|sctp4|ip4|tcp6|udp6|sctp6|ip6|ether} key value ...
//! action {pass|drop}`, with `m <mask>` following a value to mask it.
//! Mirrors the index-walking style of the teacher's TC flower/u32 option
//! parsers (`rip_tc::builders::filter`): a `while i < tokens.len()` loop
//! that advances `i` by however many tokens each keyword consumes.

use crate::dialect::{encode_ip_prefix, encode_uint, parse_uint, tokenize};
use crate::error::{Error, ParseErrorKind, Result};
use crate::model::{Action, Comparison, Match, MatchType, Rule};

const DIALECT: &str = "ethtool";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
    Any,
}

pub fn parse_str(line: &str) -> Result<Rule> {
    let tokens = tokenize(line);
    let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
    parse(&refs)
}

pub fn parse(tokens: &[&str]) -> Result<Rule> {
    let (family, l4_proto) = flow_type(tokens)?;

    let mut matches = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut action = None;

    if let Some(proto) = l4_proto {
        let kind = l4proto_kind(family);
        matches.push(Match::new(kind, Comparison::Equal, &[proto])?);
    }

    let mut i = 0;
    while i < tokens.len() {
        let key = tokens[i];
        if key == "flow-type" {
            i += 2;
            continue;
        }
        if i + 1 >= tokens.len() {
            return Err(Error::parse(DIALECT, key, ParseErrorKind::UnknownKeyword));
        }
        let value = tokens[i + 1];
        i += 2;

        if key == "action" {
            action = Some(parse_action(value)?);
            continue;
        }

        if !seen.insert(key) {
            return Err(Error::parse(DIALECT, key, ParseErrorKind::DuplicateMatch));
        }

        let mut m = parse_field(key, value, family)?;

        if i < tokens.len() && tokens[i] == "m" {
            if i + 1 >= tokens.len() {
                return Err(Error::parse(DIALECT, "m", ParseErrorKind::MalformedValue));
            }
            let mask_value = tokens[i + 1];
            i += 2;
            let mask_bytes = field_mask_bytes(key, mask_value, &m)?;
            m = m.with_mask(&mask_bytes)?;
        }

        matches.push(m);
    }

    let action = action.ok_or_else(|| Error::parse(DIALECT, "action", ParseErrorKind::MissingAction))?;
    Rule::new(matches, action)
}

fn flow_type(tokens: &[&str]) -> Result<(Family, Option<u8>)> {
    let idx = tokens
        .iter()
        .position(|t| *t == "flow-type")
        .ok_or_else(|| Error::parse(DIALECT, "flow-type", ParseErrorKind::MissingAction))?;
    let value = *tokens
        .get(idx + 1)
        .ok_or_else(|| Error::parse(DIALECT, "flow-type", ParseErrorKind::MalformedValue))?;
    Ok(match value {
        "tcp4" => (Family::V4, Some(6)),
        "udp4" => (Family::V4, Some(17)),
        "sctp4" => (Family::V4, Some(132)),
        "ip4" => (Family::V4, None),
        "tcp6" => (Family::V6, Some(6)),
        "udp6" => (Family::V6, Some(17)),
        "sctp6" => (Family::V6, Some(132)),
        "ip6" => (Family::V6, None),
        "ether" => (Family::Any, None),
        other => {
            return Err(Error::parse(
                DIALECT,
                other,
                ParseErrorKind::UnsupportedPredicate,
            ))
        }
    })
}

fn l4proto_kind(family: Family) -> MatchType {
    match family {
        Family::V4 | Family::Any => MatchType::Ip4L4Proto,
        Family::V6 => MatchType::Ip6L4Proto,
    }
}

fn parse_action(value: &str) -> Result<Action> {
    match value {
        "pass" => Ok(Action::Pass),
        "drop" => Ok(Action::Drop),
        other => Err(Error::parse(DIALECT, other, ParseErrorKind::UnknownKeyword)),
    }
}

fn parse_field(key: &str, value: &str, family: Family) -> Result<Match> {
    match key {
        "src-ip" => ip_match(value, family, true),
        "dst-ip" => ip_match(value, family, false),
        "src-mac" => mac_match(value, MatchType::EthSrc),
        "dst-mac" => mac_match(value, MatchType::EthDst),
        "ether-proto" => uint_match(MatchType::EthProto, value),
        "src-port" => uint_match(port_kind(family, true), value),
        "dst-port" => uint_match(port_kind(family, false), value),
        "l4proto" => uint_match(l4proto_kind(family), value),
        "vlan" => uint_match(MatchType::VlanId, value),
        "vlan-etype" => uint_match(MatchType::VlanProto, value),
        "tos" => uint_match(tos_kind(family), value),
        "ttl" => uint_match(ttl_kind(family), value),
        other => Err(Error::parse(DIALECT, other, ParseErrorKind::UnknownKeyword)),
    }
}

fn port_kind(family: Family, src: bool) -> MatchType {
    match (family, src) {
        (Family::V4 | Family::Any, true) => MatchType::Ip4L4Src,
        (Family::V4 | Family::Any, false) => MatchType::Ip4L4Dst,
        (Family::V6, true) => MatchType::Ip6L4Src,
        (Family::V6, false) => MatchType::Ip6L4Dst,
    }
}

fn tos_kind(family: Family) -> MatchType {
    match family {
        Family::V4 | Family::Any => MatchType::Ip4Tos,
        Family::V6 => MatchType::Ip6Tos,
    }
}

fn ttl_kind(family: Family) -> MatchType {
    match family {
        Family::V4 | Family::Any => MatchType::Ip4Ttl,
        Family::V6 => MatchType::Ip6Ttl,
    }
}

fn uint_match(kind: MatchType, value: &str) -> Result<Match> {
    let raw = parse_uint(DIALECT, value)?;
    let bytes = encode_uint(DIALECT, value, raw, kind.value_format())?;
    Match::new(kind, Comparison::Equal, &bytes)
}

fn mac_match(value: &str, kind: MatchType) -> Result<Match> {
    let mac = crate::util::addr::parse_mac(value)
        .ok_or_else(|| Error::parse(DIALECT, value, ParseErrorKind::MalformedValue))?;
    Match::new(kind, Comparison::Equal, &mac)
}

fn ip_match(value: &str, family: Family, src: bool) -> Result<Match> {
    let (addr_bytes, mask_bytes, is_v4) = encode_ip_prefix(DIALECT, value)?;
    if (family == Family::V4 && !is_v4) || (family == Family::V6 && is_v4) {
        return Err(Error::parse(DIALECT, value, ParseErrorKind::MalformedValue));
    }
    let kind = match (is_v4, src) {
        (true, true) => MatchType::Ip4Src,
        (true, false) => MatchType::Ip4Dst,
        (false, true) => MatchType::Ip6Src,
        (false, false) => MatchType::Ip6Dst,
    };
    let m = Match::new(kind, Comparison::Equal, &addr_bytes)?;
    match mask_bytes {
        Some(mask) => m.with_mask(&mask),
        None => Ok(m),
    }
}

fn field_mask_bytes(key: &str, value: &str, built: &Match) -> Result<Vec<u8>> {
    match key {
        "src-mac" | "dst-mac" => {
            let mac = crate::util::addr::parse_mac(value)
                .ok_or_else(|| Error::parse(DIALECT, value, ParseErrorKind::MalformedValue))?;
            Ok(mac.to_vec())
        }
        "src-ip" | "dst-ip" => {
            let raw = parse_uint(DIALECT, value).ok();
            if let Some(raw) = raw {
                Ok(encode_uint(DIALECT, value, raw, built.kind.value_format())?)
            } else {
                let (bytes, _, _) = encode_ip_prefix(DIALECT, value)?;
                Ok(bytes)
            }
        }
        _ => {
            let raw = parse_uint(DIALECT, value)?;
            encode_uint(DIALECT, value, raw, built.kind.value_format())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tcp_port_drop() {
        let rule = parse(&["flow-type", "tcp4", "dst-port", "22", "action", "drop"]).unwrap();
        assert_eq!(rule.action, Action::Drop);
        // l4proto (tcp) implied + dst-port == 2 matches
        assert_eq!(rule.matches().len(), 2);
        assert!(rule
            .matches()
            .iter()
            .any(|m| m.kind == MatchType::Ip4L4Dst && m.value_bytes() == [0, 22]));
    }

    #[test]
    fn rejects_out_of_range_ip() {
        let err = parse(&["flow-type", "ip4", "src-ip", "999.0.0.0", "action", "drop"]).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::MalformedValue,
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_key() {
        let err = parse(&[
            "flow-type", "ip4", "dst-port", "22", "dst-port", "23", "action", "drop",
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::DuplicateMatch,
                ..
            }
        ));
    }

    #[test]
    fn missing_action_fails() {
        let err = parse(&["flow-type", "ip4", "dst-port", "22"]).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::MissingAction,
                ..
            }
        ));
    }

    #[test]
    fn mask_token_applies_to_preceding_value() {
        let rule = parse(&[
            "flow-type", "ip4", "tos", "0x10", "m", "0xff", "action", "pass",
        ])
        .unwrap();
        let m = rule
            .matches()
            .iter()
            .find(|m| m.kind == MatchType::Ip4Tos)
            .unwrap();
        assert!(m.use_mask());
        assert_eq!(m.mask_bytes(), &[0xff]);
    }

    #[test]
    fn parse_str_splits_whitespace() {
        let rule = parse_str("flow-type udp4 dst-port 53 action pass").unwrap();
        assert_eq!(rule.action, Action::Pass);
    }
}
