use chrono::NaiveDate;
use shoplens_core::cohort::{retention_curve, Period};
use shoplens_core::transaction::TransactionRecord;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn txn(id: &str, customer: &str, y: i32, m: u32, d: u32) -> TransactionRecord {
    TransactionRecord {
        transaction_id: id.to_string(),
        customer_id: customer.to_string(),
        product_id: "p-0001".into(),
        timestamp: NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap(),
        quantity: 2,
        amount: 40.0,
        cost: 18.0,
        payment_method: "PayPal".into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The first period has no baseline: retention must be None, never 0.
#[test]
fn first_period_has_no_retention_rate() {
    let txns = vec![txn("t-1", "a", 2022, 1, 5), txn("t-2", "b", 2022, 1, 20)];

    let curve = retention_curve(&txns);

    assert_eq!(curve.len(), 1);
    assert_eq!(curve[0].period, Period { year: 2022, month: 1 });
    assert_eq!(curve[0].active_customers, 2);
    assert!(curve[0].retention_rate.is_none());
}

/// retention = 100 × active_this / active_prev, exact within 1e-9.
#[test]
fn retention_rate_is_exact() {
    let txns = vec![
        txn("t-1", "a", 2022, 1, 2),
        txn("t-2", "b", 2022, 1, 9),
        txn("t-3", "c", 2022, 1, 15),
        txn("t-4", "d", 2022, 1, 28),
        txn("t-5", "a", 2022, 2, 3),
        txn("t-6", "b", 2022, 2, 17),
    ];

    let curve = retention_curve(&txns);

    assert_eq!(curve.len(), 2);
    let feb = &curve[1];
    assert_eq!(feb.active_customers, 2);
    let rate = feb.retention_rate.expect("february has a baseline");
    assert!((rate - 50.0).abs() < 1e-9, "expected exactly 50, got {rate}");
}

/// A customer active twice in one month counts once.
#[test]
fn activity_is_deduplicated_within_a_period() {
    let txns = vec![
        txn("t-1", "a", 2022, 3, 1),
        txn("t-2", "a", 2022, 3, 14),
        txn("t-3", "a", 2022, 3, 30),
    ];

    let curve = retention_curve(&txns);
    assert_eq!(curve[0].active_customers, 1);
}

/// Gap months appear with zero actives; the month after a zero month has
/// no baseline and must be None — 0% retention and "no data" are
/// different answers.
#[test]
fn gap_months_yield_zero_then_null() {
    let txns = vec![txn("t-1", "a", 2022, 1, 10), txn("t-2", "a", 2022, 3, 10)];

    let curve = retention_curve(&txns);

    assert_eq!(curve.len(), 3);

    let feb = &curve[1];
    assert_eq!(feb.period, Period { year: 2022, month: 2 });
    assert_eq!(feb.active_customers, 0);
    assert_eq!(feb.retention_rate, Some(0.0), "february is a real 0%");

    let mar = &curve[2];
    assert_eq!(mar.active_customers, 1);
    assert!(
        mar.retention_rate.is_none(),
        "march has a zero baseline, rate must be None"
    );
}

/// Periods roll over year boundaries in calendar order.
#[test]
fn periods_cross_year_boundaries() {
    let txns = vec![
        txn("t-1", "a", 2022, 12, 10),
        txn("t-2", "b", 2022, 12, 11),
        txn("t-3", "a", 2023, 1, 8),
    ];

    let curve = retention_curve(&txns);

    assert_eq!(curve.len(), 2);
    assert_eq!(curve[1].period, Period { year: 2023, month: 1 });
    let rate = curve[1].retention_rate.unwrap();
    assert!((rate - 50.0).abs() < 1e-9);
}

/// Growth above the baseline reads as more than 100%.
#[test]
fn retention_can_exceed_one_hundred_percent() {
    let txns = vec![
        txn("t-1", "a", 2022, 5, 1),
        txn("t-2", "a", 2022, 6, 1),
        txn("t-3", "b", 2022, 6, 2),
        txn("t-4", "c", 2022, 6, 3),
    ];

    let curve = retention_curve(&txns);
    let jun = &curve[1];
    let rate = jun.retention_rate.unwrap();
    assert!((rate - 300.0).abs() < 1e-9);
}

#[test]
fn empty_input_yields_empty_curve() {
    assert!(retention_curve(&[]).is_empty());
}
