//! `pflowerctl rule`: ingest or delete a single rule (spec.md §6's
//! `load_rule`/`load_rule_str`/delete-by-index operations).

use std::path::Path;

use clap::{Args, Subcommand, ValueEnum};

use super::{open_filter, save_filter};

#[derive(Args)]
pub struct RuleCmd {
    #[command(subcommand)]
    action: RuleAction,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum DialectArg {
    Ethtool,
    Pcap,
    TcFlower,
    Iptables,
    OvsFlow,
}

impl From<DialectArg> for pflower::Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Ethtool => pflower::Dialect::EthtoolNtuple,
            DialectArg::Pcap => pflower::Dialect::Pcap,
            DialectArg::TcFlower => pflower::Dialect::TcFlower,
            DialectArg::Iptables => pflower::Dialect::Iptables,
            DialectArg::OvsFlow => pflower::Dialect::OvsFlow,
        }
    }
}

#[derive(Subcommand)]
enum RuleAction {
    /// Parse a rule from pre-tokenized words and insert it.
    Add {
        /// Source dialect.
        #[arg(long, value_enum)]
        dialect: DialectArg,

        /// Index to insert at (negative canonicalizes to append).
        #[arg(long, default_value_t = -1)]
        index: i64,

        /// The rule's tokens, e.g. `flow-type tcp4 dst-port 22 action drop`.
        #[arg(trailing_var_arg = true, required = true)]
        tokens: Vec<String>,
    },

    /// Parse a rule from a single raw line and insert it.
    LoadStr {
        #[arg(long, value_enum)]
        dialect: DialectArg,

        #[arg(long, default_value_t = -1)]
        index: i64,

        /// The whole rule as one string.
        line: String,
    },

    /// Delete the rule at `index`.
    Del {
        index: usize,
    },
}

impl RuleCmd {
    pub fn run(self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut filter = open_filter(path)?;

        match self.action {
            RuleAction::Add { dialect, index, tokens } => {
                let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
                let idx = pflower::load_rule(&mut filter, dialect.into(), &refs, index)?;
                println!("inserted rule at index {idx}");
            }
            RuleAction::LoadStr { dialect, index, line } => {
                let idx = pflower::load_rule_str(&mut filter, dialect.into(), &line, index)?;
                println!("inserted rule at index {idx}");
            }
            RuleAction::Del { index } => {
                filter.delete(index)?;
                println!("deleted rule at index {index}");
            }
        }

        save_filter(&filter, path)
    }
}
