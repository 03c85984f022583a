//! Tuning constants for the proof engine and simulator.
//!
//! None of these affect result correctness, only how much work is spent
//! on duplicate suppression, filter learning and recursion.

use serde::{Deserialize, Serialize};

use crate::error::{GdlError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Duplicate checks a site may run without removing anything before it is disabled.
    pub dedup_visit_limit: u32,
    /// Same limit for the unions of top-level disjunctions.
    pub dedup_visit_limit_top: u32,
    /// Visits after which filter sets and disjunction modes adapt.
    pub adapt_after_visits: u32,
    /// Filters below this hit rate are dropped.
    pub filter_drop_below: f64,
    /// Drop threshold for filters on recursive sites.
    pub recursive_filter_drop_below: f64,
    /// Learning rewrites narrow only when the filter source has fewer rows than this...
    pub learning_source_limit: usize,
    /// ...and the candidate range is wider than the source.
    pub learning_target_floor: usize,
    /// Ticks a rollout may take before it is reported as exhausted.
    pub max_ticks: u32,
    /// Nesting depth at which recursive expansion gives up on a branch.
    pub max_recursion_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_visit_limit: 30,
            dedup_visit_limit_top: 100,
            adapt_after_visits: 10,
            filter_drop_below: 0.11,
            recursive_filter_drop_below: 0.01,
            learning_source_limit: 4,
            learning_target_floor: 15,
            max_ticks: 1000,
            max_recursion_depth: 512,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: EngineConfig =
            serde_json::from_str(text).map_err(|e| GdlError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("filter_drop_below", self.filter_drop_below),
            ("recursive_filter_drop_below", self.recursive_filter_drop_below),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GdlError::Config(format!("{name} must lie in [0, 1], got {v}")));
            }
        }
        if self.max_ticks == 0 {
            return Err(GdlError::Config("max_ticks must be positive".to_string()));
        }
        if self.max_recursion_depth == 0 {
            return Err(GdlError::Config("max_recursion_depth must be positive".to_string()));
        }
        Ok(())
    }

    pub(crate) fn drop_threshold(&self, recursive: bool) -> f64 {
        if recursive {
            self.recursive_filter_drop_below
        } else {
            self.filter_drop_below
        }
    }
}
