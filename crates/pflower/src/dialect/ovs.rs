//! OVS flow dialect (spec.md §4.2): comma-separated `key=value` pairs,
//! terminated by an `actions=output|drop` entry. Reuses the tc-flower
//! field vocabulary (`src_ip`, `dst_port`, `ip_proto`, ...) since both
//! dialects describe the same flow-key fields, just with different
//! delimiters (spec.md §9 groups them as sharing a field model).

use crate::dialect::tc_flower;
use crate::error::{Error, ParseErrorKind, Result};
use crate::model::{Action, Rule};

const DIALECT: &str = "ovs-flow";

pub fn parse_str(line: &str) -> Result<Rule> {
    let mut matches = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut action = None;

    for field in line.split(',') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| Error::parse(DIALECT, field, ParseErrorKind::MalformedValue))?;

        if key == "actions" {
            action = Some(parse_action(value)?);
            continue;
        }

        if !seen.insert(key.to_string()) {
            return Err(Error::parse(DIALECT, key, ParseErrorKind::DuplicateMatch));
        }

        matches.push(tc_flower::parse_field(key, value).map_err(|e| match e {
            // tc_flower::parse_field tags its errors with its own dialect
            // name; re-tag as ours while keeping the real error kind (an
            // unrecognized value shouldn't be reported as an unknown key).
            Error::Parse { token, kind, .. } => Error::parse(DIALECT, token, kind),
            other => other,
        })?);
    }

    let action = action.ok_or_else(|| Error::parse(DIALECT, "actions", ParseErrorKind::MissingAction))?;
    Rule::new(matches, action)
}

fn parse_action(value: &str) -> Result<Action> {
    match value {
        "output" => Ok(Action::Pass),
        "drop" => Ok(Action::Drop),
        other => Err(Error::parse(DIALECT, other, ParseErrorKind::UnknownKeyword)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_fields_parse() {
        let rule = parse_str("ip_proto=tcp,dst_port=80,actions=drop").unwrap();
        assert_eq!(rule.action, Action::Drop);
        assert_eq!(rule.matches().len(), 2);
    }

    #[test]
    fn output_action_is_pass() {
        let rule = parse_str("src_ip=10.0.0.1,actions=output").unwrap();
        assert_eq!(rule.action, Action::Pass);
    }

    #[test]
    fn missing_actions_fails() {
        let err = parse_str("dst_port=80").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::MissingAction,
                ..
            }
        ));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = parse_str("frobnicate=1,actions=drop").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::UnknownKeyword,
                ..
            }
        ));
    }

    #[test]
    fn bad_value_for_known_key_is_malformed_not_unknown() {
        let err = parse_str("src_mac=not-a-mac,actions=drop").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                dialect: "ovs-flow",
                kind: ParseErrorKind::MalformedValue,
                ..
            }
        ));
    }
}
