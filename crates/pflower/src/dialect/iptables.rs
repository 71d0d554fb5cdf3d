//! iptables dialect (spec.md §4.2): a whitelisted subset of the `-A` rule
//! syntax — `-s`, `-d`, `-p {tcp|udp|sctp}`, `--sport`, `--dport`, and the
//! terminal `-j {ACCEPT|DROP}`. Any option outside this whitelist fails
//! parsing (spec.md §9 notes this grammar is deliberately not exhaustive).
//!
//! Flag-walking loop in the same style as the ethtool/tc-flower parsers;
//! this dialect assumes IPv4 (there is no separate ip6tables front-end
//! here, per DESIGN.md).

use crate::dialect::{encode_ip_prefix, parse_uint, tokenize};
use crate::error::{Error, ParseErrorKind, Result};
use crate::model::{Action, Comparison, Match, MatchType, Rule};

const DIALECT: &str = "iptables";

pub fn parse_str(line: &str) -> Result<Rule> {
    let tokens = tokenize(line);
    let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
    parse(&refs)
}

pub fn parse(tokens: &[&str]) -> Result<Rule> {
    if tokens.first() != Some(&"-A") {
        return Err(Error::parse(
            DIALECT,
            tokens.first().copied().unwrap_or("<empty>"),
            ParseErrorKind::UnknownKeyword,
        ));
    }
    if tokens.len() < 2 {
        return Err(Error::parse(DIALECT, "-A", ParseErrorKind::MalformedValue));
    }

    let mut matches = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut action = None;

    let mut i = 2; // skip "-A" <chain>
    while i < tokens.len() {
        let flag = tokens[i];

        if flag == "-j" {
            let value = tokens
                .get(i + 1)
                .ok_or_else(|| Error::parse(DIALECT, "-j", ParseErrorKind::MalformedValue))?;
            action = Some(parse_action(value)?);
            i += 2;
            continue;
        }

        if i + 1 >= tokens.len() {
            return Err(Error::parse(DIALECT, flag, ParseErrorKind::UnknownKeyword));
        }
        let value = tokens[i + 1];
        i += 2;

        if !seen.insert(flag) {
            return Err(Error::parse(DIALECT, flag, ParseErrorKind::DuplicateMatch));
        }

        matches.push(parse_flag(flag, value)?);
    }

    let action = action.ok_or_else(|| Error::parse(DIALECT, "-j", ParseErrorKind::MissingAction))?;
    Rule::new(matches, action)
}

fn parse_action(value: &str) -> Result<Action> {
    match value {
        "ACCEPT" => Ok(Action::Pass),
        "DROP" => Ok(Action::Drop),
        other => Err(Error::parse(DIALECT, other, ParseErrorKind::UnknownKeyword)),
    }
}

fn parse_flag(flag: &str, value: &str) -> Result<Match> {
    match flag {
        "-s" => addr_match(value, true),
        "-d" => addr_match(value, false),
        "-p" => proto_match(value),
        "--sport" => port_match(value, MatchType::Ip4L4Src),
        "--dport" => port_match(value, MatchType::Ip4L4Dst),
        other => Err(Error::parse(DIALECT, other, ParseErrorKind::UnknownKeyword)),
    }
}

fn addr_match(value: &str, src: bool) -> Result<Match> {
    let (bytes, mask, is_v4) = encode_ip_prefix(DIALECT, value)?;
    if !is_v4 {
        return Err(Error::parse(DIALECT, value, ParseErrorKind::MalformedValue));
    }
    let kind = if src { MatchType::Ip4Src } else { MatchType::Ip4Dst };
    let m = Match::new(kind, Comparison::Equal, &bytes)?;
    match mask {
        Some(mask) => m.with_mask(&mask),
        None => Ok(m),
    }
}

fn proto_match(value: &str) -> Result<Match> {
    let proto: u8 = match value {
        "tcp" => 6,
        "udp" => 17,
        "sctp" => 132,
        other => return Err(Error::parse(DIALECT, other, ParseErrorKind::UnsupportedPredicate)),
    };
    Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[proto])
}

fn port_match(value: &str, kind: MatchType) -> Result<Match> {
    let port = parse_uint(DIALECT, value)?;
    if port > u16::MAX as u64 {
        return Err(Error::parse(DIALECT, value, ParseErrorKind::ValueOutOfRange));
    }
    Match::new(kind, Comparison::Equal, &(port as u16).to_be_bytes())
}
