use shoplens_core::clv::{estimate, estimate_population, ClvBand};
use shoplens_core::error::AnalyticsError;
use shoplens_core::features::CustomerFeatures;
use std::collections::BTreeMap;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn features(id: &str, monetary: f64, frequency: u64, tenure: i64) -> CustomerFeatures {
    let first = chrono::NaiveDate::from_ymd_opt(2022, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    CustomerFeatures {
        customer_id: id.to_string(),
        recency_days: 10,
        frequency,
        monetary,
        tenure_days: tenure,
        avg_order_value: monetary / frequency.max(1) as f64,
        total_items: frequency,
        unique_products: frequency.min(4),
        total_profit: monetary * 0.25,
        first_purchase: first,
        last_purchase: first,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Same-day-only customer: tenure 0 must not divide by zero.
/// monetary=100, frequency=1, tenure=0 → clv = 100 × 1 / max(0,1) = 100.
#[test]
fn zero_tenure_customer_is_well_defined() {
    let clv = estimate(&features("c-1", 100.0, 1, 0)).unwrap();
    assert!((clv - 100.0).abs() < 1e-9, "expected 100, got {clv}");
}

#[test]
fn clv_is_non_negative_for_valid_inputs() {
    let cases = [
        (0.0, 0, 0),
        (50.0, 1, 400),
        (10_000.0, 80, 30),
        (0.01, 1, 1),
    ];
    for (monetary, frequency, tenure) in cases {
        let clv = estimate(&features("c-x", monetary, frequency, tenure)).unwrap();
        assert!(clv >= 0.0, "clv {clv} negative for ({monetary},{frequency},{tenure})");
    }
}

#[test]
fn demand_rate_normalization_divides_by_tenure() {
    // Same volume over 10× the tenure = one tenth of the rate.
    let fast = estimate(&features("c-1", 1000.0, 10, 10)).unwrap();
    let slow = estimate(&features("c-2", 1000.0, 10, 100)).unwrap();
    assert!((fast / slow - 10.0).abs() < 1e-9);
}

/// Negative monetary is upstream corruption and must be rejected, not
/// scored.
#[test]
fn negative_monetary_is_an_invalid_feature() {
    let err = estimate(&features("c-bad", -5.0, 3, 100)).unwrap_err();
    match err {
        AnalyticsError::InvalidFeature { customer_id, field, .. } => {
            assert_eq!(customer_id, "c-bad");
            assert_eq!(field, "monetary");
        }
        other => panic!("expected InvalidFeature, got {other}"),
    }
}

/// Bands cut the run's own CLV distribution: bottom quartile Low, top
/// quartile High.
#[test]
fn bands_are_population_relative_quartiles() {
    let pop: BTreeMap<String, CustomerFeatures> = (0..8)
        .map(|i| {
            let f = features(&format!("c-{i}"), (i + 1) as f64 * 100.0, 4, 100);
            (f.customer_id.clone(), f)
        })
        .collect();

    let (estimates, failures) = estimate_population(&pop);

    assert!(failures.is_empty());
    assert_eq!(estimates["c-0"].band, ClvBand::Low);
    assert_eq!(estimates["c-7"].band, ClvBand::High);
    assert_eq!(estimates["c-3"].band, ClvBand::Medium);
}

/// Fewer than four customers cannot support quartile cuts: everyone bands
/// Medium.
#[test]
fn tiny_populations_band_medium() {
    let pop: BTreeMap<String, CustomerFeatures> = (0..3)
        .map(|i| {
            let f = features(&format!("c-{i}"), (i + 1) as f64 * 100.0, 4, 100);
            (f.customer_id.clone(), f)
        })
        .collect();

    let (estimates, _) = estimate_population(&pop);
    for e in estimates.values() {
        assert_eq!(e.band, ClvBand::Medium);
    }
}

/// A corrupt customer is excluded and reported, not fatal.
#[test]
fn corrupt_customer_is_isolated() {
    let mut pop: BTreeMap<String, CustomerFeatures> = (0..5)
        .map(|i| {
            let f = features(&format!("c-{i}"), (i + 1) as f64 * 100.0, 4, 100);
            (f.customer_id.clone(), f)
        })
        .collect();
    pop.insert("c-bad".into(), features("c-bad", f64::NAN, 4, 100));

    let (estimates, failures) = estimate_population(&pop);

    assert_eq!(estimates.len(), 5);
    assert!(!estimates.contains_key("c-bad"));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].customer_id, "c-bad");
}
