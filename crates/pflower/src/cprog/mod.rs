//! Cprog: the lowered, option-resolved emission plan derived from a Filter
//! for a chosen attachment target (spec.md §3/§4.3-§4.5).

pub mod analyzer;
pub mod buf;
pub mod emitter;
pub mod schema;
pub mod table;

use bitflags::bitflags;

use crate::error::{logged, Error, Result};
use crate::filter::Filter;

/// The in-kernel hook the emitted program targets; changes the entry
/// function's signature and verdict constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    IngressExpress,
    IngressClassifier,
}

impl Target {
    pub(crate) fn entry_fn_name(self) -> &'static str {
        match self {
            Target::IngressExpress => "pflower_ingress_express",
            Target::IngressClassifier => "pflower_ingress_classifier",
        }
    }

    pub(crate) fn verdict_type(self) -> &'static str {
        match self {
            Target::IngressExpress => "xdp_md",
            Target::IngressClassifier => "__sk_buff",
        }
    }

    pub(crate) fn pass_verdict(self) -> &'static str {
        match self {
            Target::IngressExpress => "XDP_PASS",
            Target::IngressClassifier => "TC_ACT_OK",
        }
    }

    pub(crate) fn drop_verdict(self) -> &'static str {
        match self {
            Target::IngressExpress => "XDP_DROP",
            Target::IngressClassifier => "TC_ACT_SHOT",
        }
    }
}

bitflags! {
    /// Protocol decode stages and structural options the emitted program
    /// must carry. The least set sufficient to decode every referenced
    /// MatchType (spec.md §3's `needs` invariant).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Needs: u32 {
        const ETHERNET      = 1 << 0;
        const IPV4          = 1 << 1;
        const IPV6          = 1 << 2;
        const L4_WINDOW     = 1 << 3;
        const TCP           = 1 << 4;
        const UDP           = 1 << 5;
        const SCTP          = 1 << 6;
        const CVLAN         = 1 << 7;
        const SVLAN         = 1 << 8;
        const USE_MASKS     = 1 << 9;
        const INLINE_MATCH  = 1 << 10;
        const NO_LOOPS      = 1 << 11;
        const CLONED_FILTER = 1 << 12;
        const NO_VLAN       = 1 << 13;
        const DEBUG_PRINT   = 1 << 14;
    }
}

bitflags! {
    /// Kernel helper identifiers the emitted code will call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Helpers: u32 {
        const MAP_LOOKUP  = 1 << 0;
        const DEBUG_PRINT = 1 << 1;
    }
}

/// Caller-supplied overrides the analyzer folds into its computed `needs`
/// (spec.md §4.3's "plus caller-supplied option overrides").
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub inline_match: bool,
    pub no_loops: bool,
    pub no_vlan: bool,
    pub debug_print: bool,
    /// Set when the caller is handing in a `Filter` it obtained via
    /// `Filter::clone` rather than the original (spec.md §3's
    /// `cloned-filter`). `Cprog` borrows its filter and has no way to
    /// tell a clone from the original by inspecting its contents, so this
    /// is provenance the caller must supply.
    pub cloned_filter: bool,
    pub license: Option<String>,
}

/// Typed, resolved emission configuration (spec.md §3).
#[derive(Debug, Clone)]
pub struct CprogOptions {
    pub target: Target,
    pub match_count: usize,
    pub needs: Needs,
    pub license: String,
    pub helpers: Helpers,
}

/// The lowered emission plan: a Filter reference plus resolved options.
/// Owns no filter storage; borrows the Filter for the duration of
/// emission (spec.md §3).
pub struct Cprog<'f> {
    pub(crate) filter: &'f Filter,
    pub options: CprogOptions,
}

impl<'f> Cprog<'f> {
    pub fn filter(&self) -> &Filter {
        self.filter
    }
}

/// Build a Cprog for `filter` and `target`, running the requirements
/// analyzer and folding in `overrides`.
#[tracing::instrument(skip(filter, overrides))]
pub fn make_cprog<'f>(
    filter: &'f Filter,
    target: Target,
    overrides: OptionOverrides,
) -> Result<Cprog<'f>> {
    logged(try_make_cprog(filter, target, overrides))
}

fn try_make_cprog(filter: &Filter, target: Target, overrides: OptionOverrides) -> Result<Cprog<'_>> {
    for rule in filter.rules() {
        if rule.matches().len() > crate::model::N_MAX {
            return Err(Error::TooManyMatches {
                count: rule.matches().len(),
                limit: crate::model::N_MAX,
            });
        }
    }

    let (needs, match_count, helpers) = analyzer::analyze(filter, &overrides);
    let license = overrides.license.unwrap_or_else(|| "GPL".to_string());

    Ok(Cprog {
        filter,
        options: CprogOptions {
            target,
            match_count,
            needs,
            license,
            helpers,
        },
    })
}
