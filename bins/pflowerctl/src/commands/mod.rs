//! Subcommand implementations, one module per `pflowerctl` subcommand
//! group (teacher precedent: `bins/tc/src/commands/*.rs`).

pub mod cprog;
pub mod filter;
pub mod rule;

use std::path::Path;

use pflower::Filter;

/// Load the filter backing `path`, or an empty one if the file doesn't
/// exist yet (a fresh `pflowerctl` invocation with no prior state).
pub(crate) fn open_filter(path: &Path) -> Result<Filter, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(pflower::persist::load(path)?)
    } else {
        Ok(Filter::new())
    }
}

pub(crate) fn save_filter(filter: &Filter, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Ok(pflower::persist::save(filter, path)?)
}
