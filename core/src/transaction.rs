//! Raw transaction records — the engine's only input.
//!
//! Records are created by the ingestion collaborator and are read-only here.
//! Input is contractually pre-validated (non-negative amounts, referential
//! integrity already enforced); the aggregator still re-checks numeric
//! fields because corrupted features poison every downstream score.

use crate::types::{CustomerId, ProductId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub timestamp: NaiveDateTime,
    pub quantity: u32,
    pub amount: f64,
    pub cost: f64,
    pub payment_method: String,
}

impl TransactionRecord {
    /// Gross profit contributed by this transaction.
    pub fn profit(&self) -> f64 {
        self.amount - self.cost
    }
}

/// Group a snapshot by customer. BTreeMap so every downstream pass iterates
/// customers in the same order on every run.
pub fn group_by_customer(
    transactions: &[TransactionRecord],
) -> BTreeMap<CustomerId, Vec<&TransactionRecord>> {
    let mut by_customer: BTreeMap<CustomerId, Vec<&TransactionRecord>> = BTreeMap::new();
    for txn in transactions {
        by_customer
            .entry(txn.customer_id.clone())
            .or_default()
            .push(txn);
    }
    by_customer
}
