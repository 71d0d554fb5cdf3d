//! libpcap filter-expression dialect (spec.md §4.2): a subset grammar of
//! atoms joined by a top-level `and` conjunction. Tokenization is done
//! with `winnow` combinators (the teacher's parser-combinator dependency);
//! each `and`-delimited clause is then matched against the small fixed set
//! of supported atoms.
//!
//! pcap has no action keyword of its own — a pcap expression is a pure
//! capture filter, so every rule parsed from it carries an implicit
//! `pass` action (see DESIGN.md for this dialect's resolution of spec.md
//! §8 scenario 3's "specify which behavior applies per dialect").

use winnow::ascii::multispace1;
use winnow::combinator::separated;
use winnow::token::take_till;
use winnow::Parser;

use crate::dialect::encode_ip_prefix;
use crate::error::{Error, ParseErrorKind, Result};
use crate::model::{Action, Comparison, Match, MatchType, Rule};

const DIALECT: &str = "pcap";

pub fn parse_str(line: &str) -> Result<Rule> {
    let words = tokenize(line)?;
    let clauses = split_on_and(&words);

    let mut matches = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for clause in clauses {
        let m = parse_clause(&clause)?;
        if !seen.insert(m.kind) {
            return Err(Error::parse(DIALECT, clause.join(" "), ParseErrorKind::DuplicateMatch));
        }
        matches.push(m);
    }

    Rule::new(matches, Action::Pass)
}

fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(Error::parse(DIALECT, "<empty>", ParseErrorKind::UnsupportedPredicate));
    }
    let words: Vec<&str> = separated(1.., take_till(1.., char::is_whitespace), multispace1)
        .parse(&mut input)
        .map_err(|_| Error::parse(DIALECT, line, ParseErrorKind::MalformedValue))?;
    Ok(words.into_iter().map(str::to_string).collect())
}

fn split_on_and(words: &[String]) -> Vec<Vec<String>> {
    let mut clauses = Vec::new();
    let mut current = Vec::new();
    for word in words {
        if word.eq_ignore_ascii_case("and") {
            clauses.push(std::mem::take(&mut current));
        } else {
            current.push(word.clone());
        }
    }
    clauses.push(current);
    clauses
}

fn parse_clause(tokens: &[String]) -> Result<Match> {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["ip"] => Match::new(MatchType::EthProto, Comparison::Equal, &0x0800u16.to_be_bytes()),
        ["ip6"] => Match::new(MatchType::EthProto, Comparison::Equal, &0x86ddu16.to_be_bytes()),
        ["tcp"] => Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[6]),
        ["udp"] => Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[17]),
        ["icmp"] => Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[1]),
        ["vlan"] => Match::new(MatchType::VlanProto, Comparison::Equal, &0x8100u16.to_be_bytes()),
        ["host", addr] => any_addr_match(addr),
        ["net", cidr] => any_addr_match(cidr),
        ["port", port] => port_match(port, MatchType::L4Any),
        ["src", "host", addr] => addr_match(addr, true),
        ["dst", "host", addr] => addr_match(addr, false),
        ["src", "net", cidr] => addr_match(cidr, true),
        ["dst", "net", cidr] => addr_match(cidr, false),
        ["src", "port", port] => port_match(port, MatchType::L4Src),
        ["dst", "port", port] => port_match(port, MatchType::L4Dst),
        ["ether", "host", mac] => {
            let bytes = crate::util::addr::parse_mac(mac)
                .ok_or_else(|| Error::parse(DIALECT, mac, ParseErrorKind::MalformedValue))?;
            Match::new(MatchType::EthAny, Comparison::Equal, &bytes)
        }
        [] => Err(Error::parse(DIALECT, "<empty clause>", ParseErrorKind::UnsupportedPredicate)),
        other => Err(Error::parse(
            DIALECT,
            &other.join(" "),
            ParseErrorKind::UnsupportedPredicate,
        )),
    }
}

fn any_addr_match(token: &str) -> Result<Match> {
    let (bytes, mask, is_v4) = encode_ip_prefix(DIALECT, token)?;
    let kind = if is_v4 { MatchType::Ip4Any } else { MatchType::Ip6Any };
    let m = Match::new(kind, Comparison::Equal, &bytes)?;
    match mask {
        Some(mask) => m.with_mask(&mask),
        None => Ok(m),
    }
}

fn addr_match(token: &str, src: bool) -> Result<Match> {
    let (bytes, mask, is_v4) = encode_ip_prefix(DIALECT, token)?;
    let kind = match (is_v4, src) {
        (true, true) => MatchType::Ip4Src,
        (true, false) => MatchType::Ip4Dst,
        (false, true) => MatchType::Ip6Src,
        (false, false) => MatchType::Ip6Dst,
    };
    let m = Match::new(kind, Comparison::Equal, &bytes)?;
    match mask {
        Some(mask) => m.with_mask(&mask),
        None => Ok(m),
    }
}

fn port_match(token: &str, kind: MatchType) -> Result<Match> {
    let port: u16 = token
        .parse()
        .map_err(|_| Error::parse(DIALECT, token, ParseErrorKind::MalformedValue))?;
    Match::new(kind, Comparison::Equal, &port.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ip_atom_implies_pass() {
        let rule = parse_str("ip").unwrap();
        assert_eq!(rule.action, Action::Pass);
        assert_eq!(rule.matches().len(), 1);
        assert_eq!(rule.matches()[0].kind, MatchType::EthProto);
    }

    #[test]
    fn top_level_and_is_conjunction() {
        let rule = parse_str("host 10.0.0.1 and port 80").unwrap();
        assert_eq!(rule.matches().len(), 2);
    }

    #[test]
    fn src_dst_qualifiers_select_direction() {
        let rule = parse_str("src host 10.0.0.1 and dst port 443").unwrap();
        assert_eq!(rule.matches()[0].kind, MatchType::Ip4Src);
        assert_eq!(rule.matches()[1].kind, MatchType::L4Dst);
    }

    #[test]
    fn duplicate_port_atom_rejected() {
        let err = parse_str("port 80 and port 81").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::DuplicateMatch,
                ..
            }
        ));
    }

    #[test]
    fn unsupported_atom_fails() {
        let err = parse_str("greater 64").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::UnsupportedPredicate,
                ..
            }
        ));
    }
}
