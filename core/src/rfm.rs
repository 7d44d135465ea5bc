//! RFM quantile scoring.
//!
//! Scores are population-relative quantile ranks, not absolute thresholds:
//! the same customer can score differently against a different population.
//! That forces a two-phase shape — a reduce step over the full
//! population per dimension, then a per-customer assignment — and means the
//! scorer cannot be sharded per customer without the global step first.
//!
//! RULES:
//!   - Recency scores descending (most recent purchase = 5).
//!   - Frequency and monetary score ascending (highest volume = 5).
//!   - Ties break by customer_id ascending, never nondeterministically.
//!   - Fewer distinct values than bins collapses the bin count; a single
//!     distinct value gives everyone the mid score. Neither is an error.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    features::CustomerFeatures,
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmScore {
    pub customer_id: CustomerId,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
}

impl RfmScore {
    /// Concatenated "555"-style code, handy for reporting.
    pub fn label(&self) -> String {
        format!("{}{}{}", self.r_score, self.f_score, self.m_score)
    }
}

/// Scoring direction for a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Larger value = higher score (frequency, monetary).
    Ascending,
    /// Larger value = lower score (recency).
    Descending,
}

/// Assign each customer a quantile score in [1, bins] for one dimension.
///
/// `values` is consumed and sorted by (value, customer_id): the id is the
/// deterministic tie-break the whole engine's reproducibility rests on.
/// Rank `i` of `n` lands in bin `i * b / n`, which makes every bin hold
/// ⌊n/b⌋ or ⌈n/b⌉ customers and never leaves a bin empty.
fn bin_dimension(
    mut values: Vec<(CustomerId, f64)>,
    bins: usize,
    direction: Direction,
) -> BTreeMap<CustomerId, u8> {
    values.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let n = values.len();
    let mut distinct = 0usize;
    let mut prev: Option<f64> = None;
    for (_, v) in &values {
        if prev != Some(*v) {
            distinct += 1;
            prev = Some(*v);
        }
    }

    let mid = ((bins + 1) / 2) as u8;
    if distinct <= 1 || bins <= 1 {
        // Uniform dimension: everyone gets the mid score. Documented, not
        // an error.
        return values.into_iter().map(|(id, _)| (id, mid)).collect();
    }

    let b = bins.min(distinct);
    if b < bins {
        log::debug!(
            "rfm: collapsing bins ({})",
            AnalyticsError::DegenerateDistribution {
                distinct,
                requested: bins,
            }
        );
    }

    // Collapsed bins still stretch across the full score range: with two
    // bins the population splits into scores 1 and `bins`, not 1 and 2 —
    // a two-customer run must still tell its best customer from its worst.
    let spread = (bins - 1) as f64 / (b - 1) as f64;
    values
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| {
            let bin = i * b / n; // 0-based, ascending by value
            let ascending = 1 + (bin as f64 * spread).round() as u8;
            let score = match direction {
                Direction::Ascending => ascending,
                Direction::Descending => bins as u8 + 1 - ascending,
            };
            (id, score)
        })
        .collect()
}

/// Score the full population. Inherently population-relative: re-running on
/// a different population redistributes every score.
pub fn score_population(
    features: &BTreeMap<CustomerId, CustomerFeatures>,
    bins: usize,
) -> AnalyticsResult<BTreeMap<CustomerId, RfmScore>> {
    if features.is_empty() {
        return Err(AnalyticsError::EmptyPopulation);
    }

    let recency: Vec<_> = features
        .values()
        .map(|f| (f.customer_id.clone(), f.recency_days as f64))
        .collect();
    let frequency: Vec<_> = features
        .values()
        .map(|f| (f.customer_id.clone(), f.frequency as f64))
        .collect();
    let monetary: Vec<_> = features
        .values()
        .map(|f| (f.customer_id.clone(), f.monetary))
        .collect();

    let r = bin_dimension(recency, bins, Direction::Descending);
    let f = bin_dimension(frequency, bins, Direction::Ascending);
    let m = bin_dimension(monetary, bins, Direction::Ascending);

    let scores = features
        .keys()
        .map(|id| {
            (
                id.clone(),
                RfmScore {
                    customer_id: id.clone(),
                    r_score: r[id],
                    f_score: f[id],
                    m_score: m[id],
                },
            )
        })
        .collect();

    log::debug!("rfm: scored {} customers across {bins} bins", features.len());
    Ok(scores)
}
