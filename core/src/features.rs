//! Feature aggregation — collapses raw transaction rows into one
//! CustomerFeatures record per customer.
//!
//! RULES:
//!   - Pure function over the input rows; no side effects, no state.
//!   - Features are rebuilt wholesale every run, never patched in place,
//!     so they are always consistent with the current snapshot.
//!   - A customer with zero transactions is a caller error (EmptyHistory),
//!     never a silent zero-recency default.
//!   - One bad customer must not sink the run: population aggregation
//!     isolates per-customer failures into a separate failure list.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    transaction::{group_by_customer, TransactionRecord},
    types::CustomerId,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row per customer, derived fresh from the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub customer_id: CustomerId,
    /// Days between the last purchase and the as-of date.
    pub recency_days: i64,
    /// Transaction count.
    pub frequency: u64,
    /// Total spend.
    pub monetary: f64,
    /// Days between the first purchase and the as-of date.
    pub tenure_days: i64,
    pub avg_order_value: f64,
    pub total_items: u64,
    /// Distinct products purchased — the diversity signal.
    pub unique_products: u64,
    pub total_profit: f64,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
}

/// A customer excluded from a run, with the reason. Returned alongside the
/// successful results so callers can report exclusions without the run dying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringFailure {
    pub customer_id: CustomerId,
    pub reason: String,
}

/// Aggregate one customer's full history into a single feature row.
pub fn aggregate_customer(
    customer_id: &str,
    transactions: &[&TransactionRecord],
    as_of: NaiveDate,
) -> AnalyticsResult<CustomerFeatures> {
    if transactions.is_empty() {
        return Err(AnalyticsError::EmptyHistory {
            customer_id: customer_id.to_string(),
        });
    }

    let mut monetary = 0.0;
    let mut total_items: u64 = 0;
    let mut total_profit = 0.0;
    let mut products: BTreeSet<&str> = BTreeSet::new();
    let mut first = transactions[0].timestamp;
    let mut last = transactions[0].timestamp;

    for txn in transactions {
        if !txn.amount.is_finite() || txn.amount < 0.0 {
            return Err(AnalyticsError::InvalidFeature {
                customer_id: customer_id.to_string(),
                field: "amount",
                value: txn.amount,
            });
        }
        if !txn.cost.is_finite() {
            return Err(AnalyticsError::InvalidFeature {
                customer_id: customer_id.to_string(),
                field: "cost",
                value: txn.cost,
            });
        }
        monetary += txn.amount;
        total_items += txn.quantity as u64;
        total_profit += txn.profit();
        products.insert(txn.product_id.as_str());
        if txn.timestamp < first {
            first = txn.timestamp;
        }
        if txn.timestamp > last {
            last = txn.timestamp;
        }
    }

    let recency_days = (as_of - last.date()).num_days();
    if recency_days < 0 {
        // as-of predates the last purchase: the snapshot is inconsistent.
        return Err(AnalyticsError::InvalidFeature {
            customer_id: customer_id.to_string(),
            field: "recency_days",
            value: recency_days as f64,
        });
    }
    let tenure_days = (as_of - first.date()).num_days();

    let frequency = transactions.len() as u64;
    Ok(CustomerFeatures {
        customer_id: customer_id.to_string(),
        recency_days,
        frequency,
        monetary,
        tenure_days,
        avg_order_value: monetary / frequency as f64,
        total_items,
        unique_products: products.len() as u64,
        total_profit,
        first_purchase: first,
        last_purchase: last,
    })
}

/// Aggregate the whole snapshot. Per-customer failures are isolated; a fully
/// empty result is fatal (EmptyPopulation).
pub fn aggregate_population(
    transactions: &[TransactionRecord],
    as_of: NaiveDate,
) -> AnalyticsResult<(BTreeMap<CustomerId, CustomerFeatures>, Vec<ScoringFailure>)> {
    let grouped = group_by_customer(transactions);
    let mut features = BTreeMap::new();
    let mut failures = Vec::new();

    for (customer_id, rows) in &grouped {
        match aggregate_customer(customer_id, rows, as_of) {
            Ok(f) => {
                features.insert(customer_id.clone(), f);
            }
            Err(e) => {
                log::warn!("features: excluding customer {customer_id}: {e}");
                failures.push(ScoringFailure {
                    customer_id: customer_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if features.is_empty() {
        return Err(AnalyticsError::EmptyPopulation);
    }

    log::debug!(
        "features: aggregated {} customers ({} excluded)",
        features.len(),
        failures.len()
    );
    Ok((features, failures))
}
