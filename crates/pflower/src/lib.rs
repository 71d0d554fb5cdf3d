//! `pflower`: lowers packet-filter rules expressed in several established
//! dialects into a safe-verifier-compatible C datapath program plus the
//! runtime lookup table it reads at classification time.
//!
//! The crate is organized as spec.md §2 describes: a value/match
//! [`model`], an index-addressable [`filter::Filter`] of rules, dialect
//! front-ends under [`dialect`], and the [`cprog`] lowering pipeline
//! (requirements analysis, code emission, runtime table construction).
//! [`persist`] and [`toolchain`]/[`kernel`] cover the external-collaborator
//! operations named in spec.md §6: file round-trip, invoking the
//! C-to-bytecode toolchain, and loading/attaching/filling the table via
//! the kernel's netlink interfaces.

pub mod cprog;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod model;
pub mod persist;
pub mod toolchain;
pub mod util;

pub use cprog::{make_cprog, Cprog, CprogOptions, OptionOverrides, Target};
pub use dialect::Dialect;
pub use error::{last_error, reset_error, Error, ParseErrorKind, Result};
pub use filter::Filter;
pub use model::{Action, Comparison, Match, MatchType, Rule, ValueFormat, N_MAX};

/// Parse `line` in `dialect` and insert the resulting rule at `index`
/// (spec.md §6's `load_rule_str`). On parse failure, the `Filter` is left
/// unchanged.
pub fn load_rule_str(filter: &mut Filter, dialect: Dialect, line: &str, index: i64) -> Result<usize> {
    error::logged(try_load_rule_str(filter, dialect, line, index))
}

fn try_load_rule_str(filter: &mut Filter, dialect: Dialect, line: &str, index: i64) -> Result<usize> {
    let rule = dialect.parse_str(line)?;
    filter.insert(index, rule)
}

/// Parse a pre-tokenized word sequence in `dialect` and insert the
/// resulting rule at `index` (spec.md §6's `load_rule`).
pub fn load_rule(filter: &mut Filter, dialect: Dialect, tokens: &[&str], index: i64) -> Result<usize> {
    error::logged(try_load_rule(filter, dialect, tokens, index))
}

fn try_load_rule(filter: &mut Filter, dialect: Dialect, tokens: &[&str], index: i64) -> Result<usize> {
    let rule = dialect.parse_tokens(tokens)?;
    filter.insert(index, rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rule_str_inserts_parsed_rule() {
        let mut f = Filter::new();
        let idx = load_rule_str(
            &mut f,
            Dialect::EthtoolNtuple,
            "flow-type tcp4 dst-port 22 action drop",
            0,
        )
        .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn load_rule_str_failure_leaves_filter_unchanged() {
        let mut f = Filter::new();
        load_rule_str(&mut f, Dialect::EthtoolNtuple, "flow-type tcp4 dst-port 22 action drop", 0).unwrap();
        let before = f.clone();
        let err = load_rule_str(&mut f, Dialect::EthtoolNtuple, "flow-type tcp4 src-ip 999.0.0.0 action drop", 1);
        assert!(err.is_err());
        assert_eq!(f, before);
    }

    #[test]
    fn load_rule_accepts_pretokenized_words() {
        let mut f = Filter::new();
        let idx = load_rule(
            &mut f,
            Dialect::EthtoolNtuple,
            &["flow-type", "udp4", "dst-port", "53", "action", "pass"],
            0,
        )
        .unwrap();
        assert_eq!(idx, 0);
    }
}
