//! Value & match model: [`MatchType`]/[`ValueFormat`], [`Match`], [`Action`],
//! and [`Rule`] (spec.md §3).

pub mod match_type;
pub mod rule;

pub use match_type::{MatchType, ValueFormat};
pub use rule::{Action, Comparison, Match, Rule, N_MAX};
