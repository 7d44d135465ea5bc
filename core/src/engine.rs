//! The analytics engine — one batch pass over a transaction snapshot.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Feature aggregation   (per customer, isolates failures)
//!   2. RFM quantile scoring  (needs the full population in memory)
//!   3. Segment classification
//!   4. CLV estimation + banding
//!   5. Churn risk scoring    (mode picked once, before the loop)
//!   6. Cohort retention      (independent of scoring, raw transactions)
//!
//! RULES:
//!   - Every derived collection is rebuilt wholesale per run; there is no
//!     cross-run state in the engine.
//!   - Population-level failures (empty snapshot) abort the run.
//!   - Per-customer failures land in `skipped`, never abort the batch.
//!   - All output maps are BTreeMaps keyed by customer_id: the same
//!     snapshot always produces the same report, byte for byte.

use crate::{
    churn::{ChurnLabel, ChurnModel, ChurnRisk},
    clv::{self, ClvEstimate},
    cohort::{self, RetentionPoint},
    config::AnalyticsConfig,
    error::AnalyticsResult,
    features::{self, CustomerFeatures, ScoringFailure},
    rfm::{self, RfmScore},
    rng::{RngBank, StreamSlot},
    segment::{Segment, SegmentRules},
    transaction::TransactionRecord,
    types::CustomerId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one run derives, keyed by customer (or period, for
/// retention). Consumed by the reporting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub as_of: NaiveDate,
    pub features: BTreeMap<CustomerId, CustomerFeatures>,
    pub rfm: BTreeMap<CustomerId, RfmScore>,
    pub segments: BTreeMap<CustomerId, Segment>,
    pub clv: BTreeMap<CustomerId, ClvEstimate>,
    pub churn: BTreeMap<CustomerId, ChurnRisk>,
    pub retention: Vec<RetentionPoint>,
    /// Customers excluded from scoring, with reasons.
    pub skipped: Vec<ScoringFailure>,
    pub insights: RunInsights,
}

/// Headline numbers for the run, ready for a report front page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInsights {
    pub total_customers: u64,
    pub total_revenue: f64,
    pub avg_customer_value: f64,
    pub avg_order_value: f64,
    pub champions: u64,
    pub at_risk: u64,
    pub segment_breakdown: BTreeMap<String, u64>,
    pub tier_breakdown: BTreeMap<String, u64>,
    /// Scores produced by the rule-based rescue path.
    pub degraded_scores: u64,
}

pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    rules: SegmentRules,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            rules: SegmentRules::default(),
        }
    }

    /// Swap in a custom ordered segment rule table.
    pub fn with_segment_rules(mut self, rules: SegmentRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Run the full pipeline, training the churn ensemble from the supplied
    /// labels. Too few labels degrades churn scoring to the rule-based
    /// fallback; it never fails the run.
    pub fn run(
        &self,
        transactions: &[TransactionRecord],
        as_of: NaiveDate,
        labels: &[ChurnLabel],
    ) -> AnalyticsResult<AnalysisReport> {
        let (features, skipped) = features::aggregate_population(transactions, as_of)?;
        let mut rng = RngBank::new(self.config.churn.training.seed).for_stream(StreamSlot::Trainer);
        let model = ChurnModel::from_training(&features, labels, &self.config.churn, &mut rng);
        self.run_pipeline(transactions, as_of, features, skipped, &model)
    }

    /// Run the full pipeline against a caller-supplied churn model (for
    /// example an ensemble deserialized from the persistence collaborator,
    /// or a deliberately rule-based run).
    pub fn run_with_model(
        &self,
        transactions: &[TransactionRecord],
        as_of: NaiveDate,
        model: &ChurnModel,
    ) -> AnalyticsResult<AnalysisReport> {
        let (features, skipped) = features::aggregate_population(transactions, as_of)?;
        self.run_pipeline(transactions, as_of, features, skipped, model)
    }

    fn run_pipeline(
        &self,
        transactions: &[TransactionRecord],
        as_of: NaiveDate,
        features: BTreeMap<CustomerId, CustomerFeatures>,
        mut skipped: Vec<ScoringFailure>,
        model: &ChurnModel,
    ) -> AnalyticsResult<AnalysisReport> {
        let rfm = rfm::score_population(&features, self.config.rfm_bins)?;

        let segments: BTreeMap<CustomerId, Segment> = rfm
            .iter()
            .map(|(id, score)| (id.clone(), self.rules.classify(score)))
            .collect();

        let (clv, clv_failures) = clv::estimate_population(&features);
        skipped.extend(clv_failures);

        let churn: BTreeMap<CustomerId, ChurnRisk> = features
            .values()
            .map(|f| (f.customer_id.clone(), model.score(f)))
            .collect();

        let retention = cohort::retention_curve(transactions);
        let insights = build_insights(&features, &segments, &churn);

        log::info!(
            "engine: scored {} customers as of {as_of} (mode={}, {} skipped, {} retention periods)",
            features.len(),
            model.mode(),
            skipped.len(),
            retention.len(),
        );

        Ok(AnalysisReport {
            as_of,
            features,
            rfm,
            segments,
            clv,
            churn,
            retention,
            skipped,
            insights,
        })
    }
}

fn build_insights(
    features: &BTreeMap<CustomerId, CustomerFeatures>,
    segments: &BTreeMap<CustomerId, Segment>,
    churn: &BTreeMap<CustomerId, ChurnRisk>,
) -> RunInsights {
    let total_customers = features.len() as u64;
    let total_revenue: f64 = features.values().map(|f| f.monetary).sum();
    let avg_order_value = if total_customers > 0 {
        features.values().map(|f| f.avg_order_value).sum::<f64>() / total_customers as f64
    } else {
        0.0
    };

    let mut segment_breakdown: BTreeMap<String, u64> = BTreeMap::new();
    for seg in segments.values() {
        *segment_breakdown.entry(seg.label().to_string()).or_default() += 1;
    }
    let mut tier_breakdown: BTreeMap<String, u64> = BTreeMap::new();
    let mut degraded_scores = 0u64;
    for risk in churn.values() {
        *tier_breakdown
            .entry(risk.risk_tier.label().to_string())
            .or_default() += 1;
        if risk.degraded {
            degraded_scores += 1;
        }
    }

    RunInsights {
        total_customers,
        total_revenue,
        avg_customer_value: if total_customers > 0 {
            total_revenue / total_customers as f64
        } else {
            0.0
        },
        avg_order_value,
        champions: segments
            .values()
            .filter(|s| **s == Segment::Champions)
            .count() as u64,
        at_risk: segments.values().filter(|s| **s == Segment::AtRisk).count() as u64,
        segment_breakdown,
        tier_breakdown,
        degraded_scores,
    }
}
