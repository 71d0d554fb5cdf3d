//! Dialect parsers: independent front-ends translating a raw rule line
//! from one of five supported syntaxes into a [`Rule`] (spec.md §4.2).
//!
//! Every parser shares this module's tokenization and numeric-encoding
//! helpers so duplicate-key detection, range checking, and error
//! reporting ("identify the dialect, the offending token, and the
//! reason", spec.md §7) stay consistent across dialects.

pub mod ethtool;
pub mod iptables;
pub mod ovs;
pub mod pcap;
pub mod tc_flower;

use crate::error::{Error, ParseErrorKind, Result};
use crate::model::ValueFormat;

/// One of the five rule syntaxes this crate ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    EthtoolNtuple,
    Pcap,
    TcFlower,
    Iptables,
    OvsFlow,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::EthtoolNtuple => "ethtool",
            Dialect::Pcap => "pcap",
            Dialect::TcFlower => "tc-flower",
            Dialect::Iptables => "iptables",
            Dialect::OvsFlow => "ovs-flow",
        }
    }

    /// Parse a single rule line in this dialect.
    pub fn parse_str(self, line: &str) -> Result<crate::model::Rule> {
        match self {
            Dialect::EthtoolNtuple => ethtool::parse_str(line),
            Dialect::Pcap => pcap::parse_str(line),
            Dialect::TcFlower => tc_flower::parse_str(line),
            Dialect::Iptables => iptables::parse_str(line),
            Dialect::OvsFlow => ovs::parse_str(line),
        }
    }

    /// Parse a pre-tokenized word sequence in this dialect (spec.md §6's
    /// `load_rule`). ethtool/TC-flower/iptables have a native token-slice
    /// parser; pcap and OVS flow key their grammars off whitespace/commas
    /// respectively, so their token form re-joins with the dialect's own
    /// separator before parsing — the tokens are never re-split on the
    /// wrong delimiter.
    pub fn parse_tokens(self, tokens: &[&str]) -> Result<crate::model::Rule> {
        match self {
            Dialect::EthtoolNtuple => ethtool::parse(tokens),
            Dialect::TcFlower => tc_flower::parse(tokens),
            Dialect::Iptables => iptables::parse(tokens),
            Dialect::Pcap => pcap::parse_str(&tokens.join(" ")),
            Dialect::OvsFlow => ovs::parse_str(&tokens.join(",")),
        }
    }
}

/// Split a raw line into whitespace-separated words, exploding any single
/// `key=value` or `key/value` composite token into two words so every
/// dialect's key-walking loop sees a flat `key value key value ...` stream.
pub(crate) fn tokenize(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    for raw in line.split_whitespace() {
        if let Some((key, value)) = raw.split_once('=') {
            if !key.is_empty() && !value.is_empty() {
                words.push(key.to_string());
                words.push(value.to_string());
                continue;
            }
        }
        words.push(raw.to_string());
    }
    words
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer token.
pub(crate) fn parse_uint(dialect: &'static str, token: &str) -> Result<u64> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        token.parse::<u64>().ok()
    };
    parsed.ok_or_else(|| Error::parse(dialect, token, ParseErrorKind::MalformedValue))
}

/// Encode an unsigned integer into the big-endian byte layout a
/// [`ValueFormat`] expects, range-checking it against the format's bit
/// width first.
pub(crate) fn encode_uint(
    dialect: &'static str,
    token: &str,
    value: u64,
    format: ValueFormat,
) -> Result<Vec<u8>> {
    let width = format.bit_width();
    let max = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    if value > max {
        return Err(Error::parse(dialect, token, ParseErrorKind::ValueOutOfRange));
    }
    let bytes = value.to_be_bytes();
    let take = format.byte_width();
    Ok(bytes[8 - take..].to_vec())
}

/// Parse an IPv4/IPv6 address (optionally with CIDR) into value bytes plus
/// an optional mask, for whichever of the two `MatchType`s fits the
/// address family.
pub(crate) fn encode_ip_prefix(
    dialect: &'static str,
    token: &str,
) -> Result<(Vec<u8>, Option<Vec<u8>>, bool)> {
    let (addr, prefix) = crate::util::addr::parse_prefix(token)
        .ok_or_else(|| Error::parse(dialect, token, ParseErrorKind::MalformedValue))?;
    let is_v4 = addr.is_ipv4();
    if let Some(v4) = crate::util::addr::ipv4_octets(&addr) {
        let has_mask = prefix != 32;
        let mask = crate::util::addr::ipv4_prefix_mask(prefix).to_be_bytes().to_vec();
        Ok((v4.to_vec(), has_mask.then_some(mask), is_v4))
    } else {
        let v6 = crate::util::addr::ipv6_octets(&addr).expect("non-v4 address is v6");
        let has_mask = prefix != 128;
        let mask = crate::util::addr::ipv6_prefix_mask(prefix).to_vec();
        Ok((v6.to_vec(), has_mask.then_some(mask), is_v4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_explodes_key_value_composites() {
        let words = tokenize("src-ip=1.2.3.4/24 action drop");
        assert_eq!(words, vec!["src-ip", "1.2.3.4/24", "action", "drop"]);
    }

    #[test]
    fn parse_uint_accepts_hex_and_decimal() {
        assert_eq!(parse_uint("t", "0x16").unwrap(), 22);
        assert_eq!(parse_uint("t", "22").unwrap(), 22);
    }

    #[test]
    fn encode_uint_rejects_out_of_range_port() {
        let err = encode_uint("t", "70000", 70000, ValueFormat::Bit16).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::ValueOutOfRange,
                ..
            }
        ));
    }
}
