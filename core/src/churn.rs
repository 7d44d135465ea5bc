//! Churn risk modeling — dual-mode scoring behind one capability interface.
//!
//! Two scorers implement the same contract, selected at construction time:
//!   - rule-based fallback: deterministic recency thresholding, used when no
//!     trained model exists or training data is too thin;
//!   - learned mode: an ensemble of independently trained binary
//!     classifiers combined by unweighted probability averaging.
//!
//! Tier bucketing from probability is shared by both modes, so tier
//! semantics stay stable even when the scoring mode changes.
//!
//! Failure policy: a dead ensemble (zero members, or every member erroring
//! on a customer) degrades to the rule-based score and flags the result —
//! it never fails the batch.

use crate::{
    config::{ChurnModelConfig, RuleThresholds},
    error::{AnalyticsError, AnalyticsResult},
    features::CustomerFeatures,
    model::{default_members, ClassifierKind},
    rng::StreamRng,
    transaction::TransactionRecord,
    types::CustomerId,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Risk tiers ───────────────────────────────────────────────────────────────

/// Tier cut points. Fixed constants, not config: downstream consumers key
/// campaigns off these names and silent recalibration would break them.
pub const MEDIUM_CUTOFF: f64 = 0.30;
pub const HIGH_CUTOFF: f64 = 0.60;
pub const CHURNED_CUTOFF: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Churned,
}

impl RiskTier {
    /// Monotonic step function of probability. Identical for both scoring
    /// modes.
    pub fn bucket(probability: f64) -> Self {
        let p = probability.clamp(0.0, 1.0);
        if p < MEDIUM_CUTOFF {
            Self::Low
        } else if p < HIGH_CUTOFF {
            Self::Medium
        } else if p < CHURNED_CUTOFF {
            Self::High
        } else {
            Self::Churned
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Churned => "Churned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnRisk {
    pub customer_id: CustomerId,
    pub risk_probability: f64,
    pub risk_tier: RiskTier,
    /// True when the rule-based fallback produced (or had to rescue) this
    /// result instead of the requested learned model.
    pub degraded: bool,
}

// ── Labels ───────────────────────────────────────────────────────────────────

/// Ground truth supplied by the training-data collaborator: churned means
/// no purchase within the horizon after the label snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnLabel {
    pub customer_id: CustomerId,
    pub churned: bool,
}

/// Convenience label builder for the collaborator: replays a historical
/// snapshot date against the full transaction log. A customer active on or
/// before `snapshot` is labeled churned iff it made no purchase in
/// (snapshot, snapshot + threshold_days].
pub fn labels_from_history(
    transactions: &[TransactionRecord],
    snapshot: NaiveDate,
    threshold_days: i64,
) -> Vec<ChurnLabel> {
    let horizon = snapshot + Duration::days(threshold_days);
    // Customers that exist at the snapshot; only they can be labeled.
    let mut seen_before: BTreeMap<&str, bool> = BTreeMap::new();
    for txn in transactions {
        if txn.timestamp.date() <= snapshot {
            seen_before.entry(txn.customer_id.as_str()).or_insert(false);
        }
    }
    for txn in transactions {
        let date = txn.timestamp.date();
        if date > snapshot && date <= horizon {
            if let Some(active) = seen_before.get_mut(txn.customer_id.as_str()) {
                *active = true;
            }
        }
    }
    seen_before
        .into_iter()
        .map(|(id, active)| ChurnLabel {
            customer_id: id.to_string(),
            churned: !active,
        })
        .collect()
}

// ── Feature engineering ──────────────────────────────────────────────────────

pub const CHURN_FEATURE_COUNT: usize = 9;

/// Engineer the churn feature vector for one customer. Every entry must be
/// finite; NaN here means corrupted upstream data.
pub fn engineer_row(features: &CustomerFeatures) -> AnalyticsResult<Vec<f64>> {
    let tenure1 = (features.tenure_days + 1) as f64;
    let frequency = features.frequency as f64;
    let row = vec![
        features.recency_days as f64,
        frequency,
        features.monetary,
        features.avg_order_value,
        features.recency_days as f64 / tenure1,      // recency ratio
        frequency / tenure1,                         // order frequency
        features.monetary / tenure1,                 // spend per day
        features.unique_products as f64 / frequency, // product diversity
        frequency * features.monetary / tenure1,     // loyalty score
    ];
    for (i, v) in row.iter().enumerate() {
        if !v.is_finite() {
            return Err(AnalyticsError::InvalidFeature {
                customer_id: features.customer_id.clone(),
                field: CHURN_FEATURE_NAMES[i],
                value: *v,
            });
        }
    }
    Ok(row)
}

pub const CHURN_FEATURE_NAMES: [&str; CHURN_FEATURE_COUNT] = [
    "recency_days",
    "frequency",
    "monetary",
    "avg_order_value",
    "recency_ratio",
    "order_frequency",
    "spend_per_day",
    "product_diversity",
    "loyalty_score",
];

/// Per-feature mean/std standardization, fitted on the training rows and
/// stored with the ensemble so scoring applies the same transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len() as f64;
        let mut mean = vec![0.0; dims];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut std = vec![0.0; dims];
        for row in rows {
            for ((s, x), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (x - m) * (x - m);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            // Constant feature: leave it centered but unscaled.
            if *s < 1e-9 {
                *s = 1.0;
            }
        }
        Self { mean, std }
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.mean)
            .zip(&self.std)
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }
}

// ── Scoring interface ────────────────────────────────────────────────────────

/// The capability both modes share. Scoring is read-only and independently
/// parallelizable per customer once a scorer exists.
pub trait ChurnScorer: Send {
    fn name(&self) -> &'static str;
    fn risk_probability(&self, features: &CustomerFeatures) -> AnalyticsResult<f64>;
}

// ── Rule-based fallback ──────────────────────────────────────────────────────

/// Representative probabilities per recency band. Chosen to land inside the
/// matching tier bucket so rule-based results bucket identically to learned
/// ones.
const RULE_LOW_P: f64 = 0.15;
const RULE_MEDIUM_P: f64 = 0.45;
const RULE_HIGH_P: f64 = 0.75;
const RULE_CHURNED_P: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct RuleBasedScorer {
    thresholds: RuleThresholds,
}

impl RuleBasedScorer {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Infallible: recency is the only input and features always carry one.
    pub fn probability(&self, features: &CustomerFeatures) -> f64 {
        let r = features.recency_days;
        if r > self.thresholds.churned_after_days {
            RULE_CHURNED_P
        } else if r > self.thresholds.high_after_days {
            RULE_HIGH_P
        } else if r > self.thresholds.medium_after_days {
            RULE_MEDIUM_P
        } else {
            RULE_LOW_P
        }
    }
}

impl ChurnScorer for RuleBasedScorer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn risk_probability(&self, features: &CustomerFeatures) -> AnalyticsResult<f64> {
        Ok(self.probability(features))
    }
}

// ── Learned ensemble ─────────────────────────────────────────────────────────

/// A trained ensemble. Serde-serializable whole: the external storage
/// collaborator owns where it lives, this type owns only what it means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnEnsemble {
    pub model_id: String,
    scaler: Scaler,
    members: Vec<ClassifierKind>,
}

/// Post-training evaluation on the holdout slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model_id: String,
    pub labeled: usize,
    pub train_size: usize,
    pub holdout_size: usize,
    /// None when the holdout was empty.
    pub ensemble_accuracy: Option<f64>,
    pub member_accuracy: Vec<(String, Option<f64>)>,
}

impl ChurnEnsemble {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Train the default roster on externally supplied labels.
    ///
    /// Errors with ModelUnavailable when fewer than
    /// `config.min_training_labels` labels join to a feature row; the caller
    /// recovers by falling back to rule-based mode.
    pub fn train(
        features: &BTreeMap<CustomerId, CustomerFeatures>,
        labels: &[ChurnLabel],
        config: &ChurnModelConfig,
        rng: &mut StreamRng,
    ) -> AnalyticsResult<(Self, TrainingSummary)> {
        // Join labels to features; labels for unknown customers are dropped.
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut targets: Vec<bool> = Vec::new();
        for label in labels {
            if let Some(f) = features.get(&label.customer_id) {
                rows.push(engineer_row(f)?);
                targets.push(label.churned);
            }
        }

        if rows.len() < config.min_training_labels {
            return Err(AnalyticsError::ModelUnavailable {
                labeled: rows.len(),
                required: config.min_training_labels,
            });
        }

        let scaler = Scaler::fit(&rows);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();

        // Seeded shuffle, then split off the holdout tail.
        let mut order: Vec<usize> = (0..scaled.len()).collect();
        rng.shuffle(&mut order);
        let holdout_size =
            ((scaled.len() as f64 * config.training.holdout_fraction) as usize).min(scaled.len() - 1);
        let (train_idx, holdout_idx) = order.split_at(scaled.len() - holdout_size);

        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| scaled[i].clone()).collect();
        let train_targets: Vec<bool> = train_idx.iter().map(|&i| targets[i]).collect();

        let mut members = default_members();
        for member in &mut members {
            member.fit(&train_rows, &train_targets, &config.training)?;
        }

        let model_id = uuid::Uuid::new_v4().to_string();
        let ensemble = Self {
            model_id: model_id.clone(),
            scaler,
            members,
        };

        // Holdout evaluation at the 0.5 decision point.
        let mut member_hits = vec![0usize; ensemble.members.len()];
        let mut ensemble_hits = 0usize;
        for &i in holdout_idx {
            let mut probs = Vec::with_capacity(ensemble.members.len());
            for (m, member) in ensemble.members.iter().enumerate() {
                let p = member.predict_proba(&scaled[i])?;
                if (p >= 0.5) == targets[i] {
                    member_hits[m] += 1;
                }
                probs.push(p);
            }
            let avg = probs.iter().sum::<f64>() / probs.len() as f64;
            if (avg >= 0.5) == targets[i] {
                ensemble_hits += 1;
            }
        }

        let acc = |hits: usize| {
            (holdout_size > 0).then(|| hits as f64 / holdout_size as f64)
        };
        let summary = TrainingSummary {
            model_id,
            labeled: scaled.len(),
            train_size: train_rows.len(),
            holdout_size,
            ensemble_accuracy: acc(ensemble_hits),
            member_accuracy: ensemble
                .members
                .iter()
                .zip(&member_hits)
                .map(|(m, &h)| (m.name().to_string(), acc(h)))
                .collect(),
        };

        log::info!(
            "churn: trained ensemble {} on {} labels ({} members, holdout acc {:?})",
            summary.model_id,
            summary.labeled,
            ensemble.members.len(),
            summary.ensemble_accuracy,
        );
        Ok((ensemble, summary))
    }
}

impl ChurnScorer for ChurnEnsemble {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    /// Unweighted average over the members that answered. All members
    /// erroring (or an empty roster) is an error here; the churn model
    /// above rescues it per customer.
    fn risk_probability(&self, features: &CustomerFeatures) -> AnalyticsResult<f64> {
        if self.members.is_empty() {
            return Err(anyhow::anyhow!("ensemble has no member classifiers").into());
        }
        let row = self.scaler.transform(&engineer_row(features)?);
        let mut sum = 0.0;
        let mut answered = 0usize;
        for member in &self.members {
            match member.predict_proba(&row) {
                Ok(p) => {
                    sum += p;
                    answered += 1;
                }
                Err(e) => {
                    log::warn!(
                        "churn: member '{}' failed for {}: {e}",
                        member.name(),
                        features.customer_id
                    );
                }
            }
        }
        if answered == 0 {
            return Err(anyhow::anyhow!("all ensemble members failed").into());
        }
        Ok(sum / answered as f64)
    }
}

// ── Mode selection ───────────────────────────────────────────────────────────

/// The churn model a run scores with: one active scorer plus the rule-based
/// rescue path. Construction decides the mode once; scoring never errors.
pub struct ChurnModel {
    scorer: Box<dyn ChurnScorer>,
    fallback: RuleBasedScorer,
    degraded: bool,
}

impl ChurnModel {
    /// Rule-based mode, chosen deliberately (not a degradation).
    pub fn rule_based(config: &ChurnModelConfig) -> Self {
        Self {
            scorer: Box::new(RuleBasedScorer::new(config.rule_thresholds.clone())),
            fallback: RuleBasedScorer::new(config.rule_thresholds.clone()),
            degraded: false,
        }
    }

    /// Learned mode from a freshly trained ensemble; degrades to rule-based
    /// when training data is insufficient.
    pub fn from_training(
        features: &BTreeMap<CustomerId, CustomerFeatures>,
        labels: &[ChurnLabel],
        config: &ChurnModelConfig,
        rng: &mut StreamRng,
    ) -> Self {
        match ChurnEnsemble::train(features, labels, config, rng) {
            Ok((ensemble, _summary)) => Self {
                scorer: Box::new(ensemble),
                fallback: RuleBasedScorer::new(config.rule_thresholds.clone()),
                degraded: false,
            },
            Err(e) => {
                log::warn!("churn: falling back to rule-based scoring: {e}");
                Self {
                    scorer: Box::new(RuleBasedScorer::new(config.rule_thresholds.clone())),
                    fallback: RuleBasedScorer::new(config.rule_thresholds.clone()),
                    degraded: true,
                }
            }
        }
    }

    /// Learned mode from a previously persisted ensemble. An empty roster
    /// is caught here, at construction, and degrades the whole run.
    pub fn from_ensemble(ensemble: ChurnEnsemble, config: &ChurnModelConfig) -> Self {
        let fallback = RuleBasedScorer::new(config.rule_thresholds.clone());
        if ensemble.member_count() == 0 {
            log::warn!(
                "churn: persisted ensemble {} has no members; degrading to rule-based",
                ensemble.model_id
            );
            return Self {
                scorer: Box::new(RuleBasedScorer::new(config.rule_thresholds.clone())),
                fallback,
                degraded: true,
            };
        }
        Self {
            scorer: Box::new(ensemble),
            fallback,
            degraded: false,
        }
    }

    pub fn mode(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Score one customer. Never errors: a scorer failure rescues through
    /// the rule-based path and marks the result degraded.
    pub fn score(&self, features: &CustomerFeatures) -> ChurnRisk {
        let (probability, degraded) = match self.scorer.risk_probability(features) {
            Ok(p) => (p, self.degraded),
            Err(e) => {
                log::warn!(
                    "churn: scorer '{}' failed for {}; using rule-based rescue: {e}",
                    self.scorer.name(),
                    features.customer_id
                );
                (self.fallback.probability(features), true)
            }
        };
        let probability = probability.clamp(0.0, 1.0);
        ChurnRisk {
            customer_id: features.customer_id.clone(),
            risk_probability: probability,
            risk_tier: RiskTier::bucket(probability),
            degraded,
        }
    }
}
