//! The growable-buffer protocol of spec.md §4.4.1, preserved for C-ABI
//! parity: `cprog_to_buf` appends the emitted source into a caller-owned,
//! reallocating buffer rather than returning a fresh allocation every
//! call. In Rust the natural surface is `Vec<u8>`; this module exposes
//! the same append-and-grow contract over one so a C shim can still hand
//! it a `char **buf, size_t *buf_len` pair unchanged.

use std::io::Write as _;
use std::path::Path;

use crate::cprog::{emitter, Cprog};
use crate::error::{logged, Result};

/// Append `cprog`'s emitted source into `buf`, growing it (and leaving a
/// trailing NUL) as spec.md §4.4.1 describes. `buf` may be empty on
/// entry; on success it holds the previous contents plus the newly
/// emitted bytes plus one NUL. On failure `buf` is left unchanged.
pub fn cprog_to_buf(cprog: &Cprog, buf: &mut Vec<u8>) -> Result<()> {
    logged(try_to_buf(cprog, buf))
}

fn try_to_buf(cprog: &Cprog, buf: &mut Vec<u8>) -> Result<()> {
    let source = emitter::emit(cprog)?;
    buf.reserve(source.len() + 1);
    buf.extend_from_slice(source.as_bytes());
    buf.push(0);
    Ok(())
}

/// Emit `cprog` directly to a file at `path` (spec.md §6's `cprog_to_file`).
pub fn cprog_to_file(cprog: &Cprog, path: impl AsRef<Path>) -> Result<()> {
    logged(try_to_file(cprog, path.as_ref()))
}

fn try_to_file(cprog: &Cprog, path: &Path) -> Result<()> {
    let source = emitter::emit(cprog)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(source.as_bytes())?;
    Ok(())
}

/// Human-readable dump of `cprog`'s resolved options, for diagnostics
/// (spec.md §6's `dump_cprog`) -- distinct from the emitted C source.
pub fn dump_cprog(cprog: &Cprog) -> String {
    format!(
        "target={:?} rules={} match_count={} needs={:?} helpers={:?} license={}",
        cprog.options.target,
        cprog.filter().len(),
        cprog.options.match_count,
        cprog.options.needs,
        cprog.options.helpers,
        cprog.options.license,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cprog::{make_cprog, OptionOverrides, Target};
    use crate::filter::Filter;
    use crate::model::{Action, Comparison, Match, MatchType, Rule};

    fn sample_cprog(filter: &Filter) -> Cprog<'_> {
        make_cprog(filter, Target::IngressExpress, OptionOverrides::default()).unwrap()
    }

    #[test]
    fn buf_grows_and_null_terminates() {
        let mut f = Filter::new();
        f.insert(
            0,
            Rule::new(
                vec![Match::new(MatchType::Ip4Ttl, Comparison::Equal, &[64]).unwrap()],
                Action::Pass,
            )
            .unwrap(),
        )
        .unwrap();
        let cprog = sample_cprog(&f);

        let mut buf = Vec::new();
        cprog_to_buf(&cprog, &mut buf).unwrap();
        assert_eq!(*buf.last().unwrap(), 0);
        assert!(buf.len() > 1);
    }

    #[test]
    fn buf_appends_rather_than_replaces() {
        let f = Filter::new();
        let cprog = sample_cprog(&f);
        let mut buf = b"preexisting".to_vec();
        let before_len = buf.len();
        cprog_to_buf(&cprog, &mut buf).unwrap();
        assert!(buf.len() > before_len);
        assert_eq!(&buf[..before_len], b"preexisting");
    }

    #[test]
    fn dump_cprog_reports_resolved_options() {
        let f = Filter::new();
        let cprog = sample_cprog(&f);
        let text = dump_cprog(&cprog);
        assert!(text.contains("IngressExpress"));
    }
}
