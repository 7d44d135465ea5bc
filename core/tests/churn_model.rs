use chrono::NaiveDate;
use shoplens_core::churn::{
    labels_from_history, ChurnEnsemble, ChurnLabel, ChurnModel, ChurnScorer, RiskTier,
};
use shoplens_core::config::ChurnModelConfig;
use shoplens_core::features::CustomerFeatures;
use shoplens_core::rng::{RngBank, StreamSlot};
use shoplens_core::transaction::TransactionRecord;
use std::collections::BTreeMap;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn features(id: &str, recency: i64, frequency: u64, monetary: f64) -> CustomerFeatures {
    let first = NaiveDate::from_ymd_opt(2022, 3, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    CustomerFeatures {
        customer_id: id.to_string(),
        recency_days: recency,
        frequency,
        monetary,
        tenure_days: 300,
        avg_order_value: monetary / frequency.max(1) as f64,
        total_items: frequency * 2,
        unique_products: frequency.min(6),
        total_profit: monetary * 0.3,
        first_purchase: first,
        last_purchase: first,
    }
}

/// 20 engaged + 20 lapsed customers with matching labels — enough to train.
fn training_population() -> (BTreeMap<String, CustomerFeatures>, Vec<ChurnLabel>) {
    let mut pop = BTreeMap::new();
    let mut labels = Vec::new();
    for i in 0..20 {
        let id = format!("active-{i:02}");
        pop.insert(
            id.clone(),
            features(&id, 3 + i as i64, 12 + i as u64, 2000.0 + i as f64 * 100.0),
        );
        labels.push(ChurnLabel { customer_id: id, churned: false });
    }
    for i in 0..20 {
        let id = format!("lapsed-{i:02}");
        pop.insert(
            id.clone(),
            features(&id, 120 + i as i64 * 5, 1 + (i % 3) as u64, 60.0 + i as f64 * 5.0),
        );
        labels.push(ChurnLabel { customer_id: id, churned: true });
    }
    (pop, labels)
}

fn txn(id: &str, customer: &str, date: NaiveDate) -> TransactionRecord {
    TransactionRecord {
        transaction_id: id.to_string(),
        customer_id: customer.to_string(),
        product_id: "p-0001".into(),
        timestamp: date.and_hms_opt(12, 0, 0).unwrap(),
        quantity: 1,
        amount: 25.0,
        cost: 10.0,
        payment_method: "Credit Card".into(),
    }
}

// ── Tier bucketing ───────────────────────────────────────────────────────────

/// Increasing probability never decreases the tier.
#[test]
fn tier_bucketing_is_monotonic() {
    let mut prev = RiskTier::Low;
    for step in 0..=1000 {
        let tier = RiskTier::bucket(step as f64 / 1000.0);
        assert!(tier >= prev, "tier regressed at p={}", step as f64 / 1000.0);
        prev = tier;
    }
}

#[test]
fn tier_boundaries_are_half_open() {
    assert_eq!(RiskTier::bucket(0.0), RiskTier::Low);
    assert_eq!(RiskTier::bucket(0.2999), RiskTier::Low);
    assert_eq!(RiskTier::bucket(0.30), RiskTier::Medium);
    assert_eq!(RiskTier::bucket(0.5999), RiskTier::Medium);
    assert_eq!(RiskTier::bucket(0.60), RiskTier::High);
    assert_eq!(RiskTier::bucket(0.8499), RiskTier::High);
    assert_eq!(RiskTier::bucket(0.85), RiskTier::Churned);
    assert_eq!(RiskTier::bucket(1.0), RiskTier::Churned);
}

// ── Rule-based fallback ──────────────────────────────────────────────────────

#[test]
fn rule_based_recency_thresholds() {
    let cfg = ChurnModelConfig::default();
    let model = ChurnModel::rule_based(&cfg);

    let cases = [
        (5, RiskTier::Low),
        (30, RiskTier::Low),
        (31, RiskTier::Medium),
        (60, RiskTier::Medium),
        (61, RiskTier::High),
        (90, RiskTier::High),
        (91, RiskTier::Churned),
        (400, RiskTier::Churned),
    ];
    for (recency, expected) in cases {
        let risk = model.score(&features("c-r", recency, 5, 500.0));
        assert_eq!(risk.risk_tier, expected, "recency {recency}");
        assert!(!risk.degraded, "deliberate rule-based mode is not degraded");
    }
}

// ── Mode selection and failure policy ────────────────────────────────────────

/// Fewer than 30 labeled examples cannot train; the run degrades to the
/// rule-based fallback and flags every result.
#[test]
fn insufficient_labels_degrade_to_rule_based() {
    let (pop, labels) = training_population();
    let thin: Vec<ChurnLabel> = labels.into_iter().take(10).collect();

    let cfg = ChurnModelConfig::default();
    let mut rng = RngBank::new(7).for_stream(StreamSlot::Trainer);
    let model = ChurnModel::from_training(&pop, &thin, &cfg, &mut rng);

    assert!(model.is_degraded());
    let risk = model.score(&features("c-x", 200, 1, 50.0));
    assert!(risk.degraded);
    assert_eq!(risk.risk_tier, RiskTier::Churned);
}

/// An ensemble persisted with zero members must degrade, never panic or
/// escape the batch.
#[test]
fn empty_persisted_ensemble_degrades() {
    let raw = r#"{
        "model_id": "m-empty",
        "scaler": { "mean": [0,0,0,0,0,0,0,0,0], "std": [1,1,1,1,1,1,1,1,1] },
        "members": []
    }"#;
    let ensemble: ChurnEnsemble = serde_json::from_str(raw).unwrap();

    let cfg = ChurnModelConfig::default();
    let model = ChurnModel::from_ensemble(ensemble, &cfg);

    assert!(model.is_degraded());
    let risk = model.score(&features("c-x", 10, 5, 500.0));
    assert!(risk.degraded);
    assert_eq!(risk.risk_tier, RiskTier::Low, "rule-based tier for fresh customer");
}

/// A healthy training set produces a non-degraded learned model that
/// separates lapsed profiles from engaged ones.
#[test]
fn trained_ensemble_separates_profiles() {
    let (pop, labels) = training_population();
    let cfg = ChurnModelConfig::default();
    let mut rng = RngBank::new(42).for_stream(StreamSlot::Trainer);

    let model = ChurnModel::from_training(&pop, &labels, &cfg, &mut rng);
    assert!(!model.is_degraded());
    assert_eq!(model.mode(), "ensemble");

    let lapsed = model.score(&features("probe-lapsed", 150, 2, 80.0));
    let engaged = model.score(&features("probe-engaged", 4, 15, 3000.0));

    assert!(!lapsed.degraded && !engaged.degraded);
    assert!((0.0..=1.0).contains(&lapsed.risk_probability));
    assert!((0.0..=1.0).contains(&engaged.risk_probability));
    assert!(
        lapsed.risk_probability > engaged.risk_probability,
        "lapsed {} should outrank engaged {}",
        lapsed.risk_probability,
        engaged.risk_probability
    );
}

/// The persistence boundary: a trained ensemble round-trips through JSON
/// and keeps scoring identically.
#[test]
fn trained_ensemble_round_trips_through_serde() {
    let (pop, labels) = training_population();
    let cfg = ChurnModelConfig::default();
    let mut rng = RngBank::new(9).for_stream(StreamSlot::Trainer);

    let (ensemble, summary) = ChurnEnsemble::train(&pop, &labels, &cfg, &mut rng).unwrap();
    assert_eq!(summary.labeled, 40);
    assert_eq!(summary.member_accuracy.len(), ensemble.member_count());

    let json = serde_json::to_string(&ensemble).unwrap();
    let restored: ChurnEnsemble = serde_json::from_str(&json).unwrap();

    let probe = features("probe", 75, 4, 600.0);
    let before = ensemble.risk_probability(&probe).unwrap();
    let after = restored.risk_probability(&probe).unwrap();
    assert!((before - after).abs() < 1e-12);
}

// ── Label building ───────────────────────────────────────────────────────────

/// Ground truth: churned = no purchase within the horizon after the
/// snapshot. Customers born after the snapshot are not labeled at all.
#[test]
fn labels_replay_the_snapshot_horizon() {
    let snapshot = NaiveDate::from_ymd_opt(2022, 6, 30).unwrap();
    let txns = vec![
        // "kept" buys before the snapshot and again inside the horizon.
        txn("t-1", "kept", NaiveDate::from_ymd_opt(2022, 5, 1).unwrap()),
        txn("t-2", "kept", NaiveDate::from_ymd_opt(2022, 8, 1).unwrap()),
        // "gone" never returns inside the horizon.
        txn("t-3", "gone", NaiveDate::from_ymd_opt(2022, 4, 10).unwrap()),
        txn("t-4", "gone", NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()),
        // "newborn" first appears after the snapshot.
        txn("t-5", "newborn", NaiveDate::from_ymd_opt(2022, 7, 15).unwrap()),
    ];

    let labels = labels_from_history(&txns, snapshot, 90);
    let by_id: BTreeMap<&str, bool> = labels
        .iter()
        .map(|l| (l.customer_id.as_str(), l.churned))
        .collect();

    assert_eq!(by_id.len(), 2);
    assert_eq!(by_id["kept"], false);
    assert_eq!(by_id["gone"], true);
    assert!(!by_id.contains_key("newborn"));
}
