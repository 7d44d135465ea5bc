//! Deterministic synthetic dataset generation.
//!
//! Used by the score-runner binary and by integration tests that need a
//! realistically skewed population without shipping fixture files. The
//! same seed always produces the same dataset.

use crate::{
    rng::{RngBank, StreamRng, StreamSlot},
    transaction::TransactionRecord,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const CATEGORIES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Home & Garden",
    "Books",
    "Sports",
    "Beauty",
];

const PAYMENT_METHODS: &[&str] = &["Credit Card", "PayPal", "Bank Transfer"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleProduct {
    pub product_id: String,
    pub category: String,
    pub brand: String,
    pub price: f64,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct SampleDataset {
    pub products: Vec<SampleProduct>,
    pub transactions: Vec<TransactionRecord>,
    /// One day after the last transaction, so every recency is ≥ 1.
    pub as_of: NaiveDate,
}

/// Generate a catalog and an hourly transaction stream starting 2022-01-01.
///
/// Customer draws are skewed (low ids buy much more often) so the RFM
/// distribution has real spread instead of uniform noise.
pub fn generate(
    seed: u64,
    n_customers: usize,
    n_products: usize,
    n_transactions: usize,
) -> SampleDataset {
    let mut rng = RngBank::new(seed).for_stream(StreamSlot::Sampler);

    let products: Vec<SampleProduct> = (0..n_products)
        .map(|i| {
            let price = 10.0 + rng.next_f64() * 490.0;
            // Cost between 40% and 85% of price keeps margins positive.
            let cost = price * (0.40 + rng.next_f64() * 0.45);
            SampleProduct {
                product_id: format!("p-{i:04}"),
                category: CATEGORIES[i % CATEGORIES.len()].to_string(),
                brand: format!("Brand_{}", i % 20),
                price,
                cost,
            }
        })
        .collect();

    let start = NaiveDate::from_ymd_opt(2022, 1, 1)
        .expect("valid constant date")
        .and_hms_opt(0, 0, 0)
        .expect("valid constant time");

    let transactions: Vec<TransactionRecord> = (0..n_transactions)
        .map(|i| {
            let customer = skewed_customer(&mut rng, n_customers);
            let product = &products[rng.next_u64_below(products.len() as u64) as usize];
            let quantity = rng.next_range(1, 10) as u32;
            TransactionRecord {
                transaction_id: format!("t-{i:06}"),
                customer_id: format!("c-{customer:05}"),
                product_id: product.product_id.clone(),
                timestamp: start + Duration::hours(i as i64),
                quantity,
                amount: quantity as f64 * product.price,
                cost: quantity as f64 * product.cost,
                payment_method: PAYMENT_METHODS
                    [rng.next_u64_below(PAYMENT_METHODS.len() as u64) as usize]
                    .to_string(),
            }
        })
        .collect();

    let as_of = transactions
        .last()
        .map(|t| t.timestamp.date() + Duration::days(1))
        .unwrap_or_else(|| start.date());

    SampleDataset {
        products,
        transactions,
        as_of,
    }
}

/// Pareto-flavored customer draw: a small head of heavy buyers, a long tail
/// of one-off shoppers.
fn skewed_customer(rng: &mut StreamRng, n_customers: usize) -> usize {
    let draw = rng.pareto(1.0, 1.3);
    let idx = (draw - 1.0) * n_customers as f64 / 20.0;
    (idx as usize).min(n_customers - 1)
}
