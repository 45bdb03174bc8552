//! Lead scoring: currency handling, the rule store, and the score calculator.

pub mod currency;
pub mod domain;
pub mod engine;
pub mod router;
pub mod storage;
pub mod store;

#[cfg(test)]
mod tests;

pub use currency::{format_brl, parse_brl};
pub use domain::{
    default_regions, default_settings, default_thresholds, AppSettings, CrmSettings, RegionRule,
    RuleId, ThresholdRule, DEFAULT_CUTOFF_SCORE,
};
pub use engine::{calculate_score, floor_threshold, CalculationResult, ScoreInput, ScoreInputError};
pub use router::{scoring_router, FormValue, SharedRuleStore};
pub use storage::{JsonFileStorage, KeyValueStorage, MemoryStorage, StorageError, StorageKey};
pub use store::{RuleChangeError, RuleSlice, RuleSnapshot, RuleStore};
