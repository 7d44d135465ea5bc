//! Engine configuration.
//!
//! Everything here is plain serde data with sensible defaults; a run can be
//! configured entirely from a JSON file or built in code. None of these
//! values change mid-run — a config is fixed for the lifetime of an engine.

use crate::error::AnalyticsResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Bin count for RFM quantile scoring. The scorer collapses below this
    /// when a dimension has fewer distinct values.
    pub rfm_bins: usize,
    pub churn: ChurnModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnModelConfig {
    /// Ground-truth horizon: a customer counts as churned when it makes no
    /// purchase within this many days after the label snapshot.
    pub threshold_days: i64,
    /// Minimum labeled examples before the learned ensemble is trusted.
    /// Below this the engine runs the rule-based fallback, flagged degraded.
    pub min_training_labels: usize,
    pub rule_thresholds: RuleThresholds,
    pub training: TrainingConfig,
}

/// Recency cut-offs for the rule-based fallback scorer, in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub churned_after_days: i64,
    pub high_after_days: i64,
    pub medium_after_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Fraction of labeled rows held out for the post-fit evaluation report.
    pub holdout_fraction: f64,
    /// Master seed for the training shuffle. Same seed + same labels =
    /// same trained ensemble, bit for bit.
    pub seed: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            rfm_bins: 5,
            churn: ChurnModelConfig::default(),
        }
    }
}

impl Default for ChurnModelConfig {
    fn default() -> Self {
        Self {
            threshold_days: 90,
            min_training_labels: 30,
            rule_thresholds: RuleThresholds::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            churned_after_days: 90,
            high_after_days: 60,
            medium_after_days: 30,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.1,
            holdout_fraction: 0.2,
            seed: 42,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.as_ref().display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
