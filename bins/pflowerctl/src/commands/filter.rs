//! `pflowerctl filter`: inspect and persist the filter itself (spec.md
//! §4.1's `len`/`dump` and §6's save/load-to-a-named-file operations).

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use super::{open_filter, save_filter};

#[derive(Args)]
pub struct FilterCmd {
    #[command(subcommand)]
    action: FilterAction,
}

#[derive(Subcommand)]
enum FilterAction {
    /// Print a human-readable listing, one rule per line, in index order.
    Dump,

    /// Print the number of rules.
    Count,

    /// Copy the filter to a different backup file.
    Save {
        to: PathBuf,
    },

    /// Replace the working filter with one loaded from another backup file.
    Load {
        from: PathBuf,
    },
}

impl FilterCmd {
    pub fn run(self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        match self.action {
            FilterAction::Dump => {
                let filter = open_filter(path)?;
                print!("{}", filter.dump_to_string());
                Ok(())
            }
            FilterAction::Count => {
                let filter = open_filter(path)?;
                println!("{}", filter.len());
                Ok(())
            }
            FilterAction::Save { to } => {
                let filter = open_filter(path)?;
                save_filter(&filter, &to)
            }
            FilterAction::Load { from } => {
                let filter = pflower::persist::load(&from)?;
                save_filter(&filter, path)
            }
        }
    }
}
