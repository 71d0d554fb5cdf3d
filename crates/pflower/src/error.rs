//! Error taxonomy and the process-wide diagnostic log.
//!
//! Every fallible core operation returns a typed [`Error`] *and* appends a
//! human-readable line to the diagnostic log, so callers on either side of
//! the C-ABI boundary (typed `Result` in Rust, `last_error()` text for a
//! C-ABI caller) see the same failure.

use std::sync::{Mutex, OnceLock};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-kinds of [`Error::Parse`], one per dialect failure mode in the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unknown keyword")]
    UnknownKeyword,
    #[error("duplicate match")]
    DuplicateMatch,
    #[error("malformed value")]
    MalformedValue,
    #[error("value out of range")]
    ValueOutOfRange,
    #[error("unsupported predicate")]
    UnsupportedPredicate,
    #[error("missing action")]
    MissingAction,
}

/// Errors surfaced by `pflower`'s core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid index: {0}")]
    InvalidIndex(usize),

    #[error("parse error in {dialect} dialect at token {token:?}: {kind}")]
    Parse {
        dialect: &'static str,
        token: String,
        kind: ParseErrorKind,
    },

    #[error("too many matches: rule has {count}, limit is {limit}")]
    TooManyMatches { count: usize, limit: usize },

    #[error("unsupported attachment target")]
    UnsupportedTarget,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toolchain error: {0}")]
    Toolchain(String),

    #[error("kernel load error: {0}")]
    KernelLoad(String),
}

impl Error {
    pub fn parse(dialect: &'static str, token: impl Into<String>, kind: ParseErrorKind) -> Self {
        Error::Parse {
            dialect,
            token: token.into(),
            kind,
        }
    }
}

fn diagnostics() -> &'static Mutex<String> {
    static LOG: OnceLock<Mutex<String>> = OnceLock::new();
    LOG.get_or_init(|| Mutex::new(String::new()))
}

/// Append a line to the process-wide diagnostic log. Called at every
/// fallible operation's error return site, alongside the typed `Error`.
pub fn log_error(err: &Error) {
    let mut log = diagnostics().lock().unwrap_or_else(|e| e.into_inner());
    log.push_str(&err.to_string());
    log.push('\n');
    tracing::debug!(error = %err, "pflower operation failed");
}

/// Returns the accumulated diagnostic text. Mirrors the C-ABI `last_error()`.
pub fn last_error() -> String {
    diagnostics()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Clears the diagnostic log. Mirrors the C-ABI `reset_error()`.
pub fn reset_error() {
    diagnostics().lock().unwrap_or_else(|e| e.into_inner()).clear();
}

/// Wraps a `Result`, logging the error (if any) before returning it.
/// Every public operation in this crate funnels its error path through
/// this so the typed error and the diagnostic log can never drift apart.
pub(crate) fn logged<T>(result: Result<T>) -> Result<T> {
    if let Err(ref err) = result {
        log_error(err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_accumulates_until_reset() {
        reset_error();
        let _ = logged::<()>(Err(Error::InvalidIndex(4)));
        let _ = logged::<()>(Err(Error::UnsupportedTarget));
        let text = last_error();
        assert!(text.contains("invalid index: 4"));
        assert!(text.contains("unsupported attachment target"));
        reset_error();
        assert_eq!(last_error(), "");
    }

    #[test]
    fn parse_error_carries_dialect_and_token() {
        let err = Error::parse("ethtool", "999.0.0.0", ParseErrorKind::ValueOutOfRange);
        let msg = err.to_string();
        assert!(msg.contains("ethtool"));
        assert!(msg.contains("999.0.0.0"));
        assert!(msg.contains("value out of range"));
    }
}
