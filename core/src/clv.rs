//! Customer lifetime value estimation.
//!
//! A demand-rate-normalized proxy, not a discounted-cash-flow model:
//! `clv = monetary × frequency / max(tenure_days, 1)`. The floor on tenure
//! keeps same-day-only customers well-defined.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    features::{CustomerFeatures, ScoringFailure},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClvEstimate {
    pub customer_id: CustomerId,
    pub clv: f64,
    /// Population-relative band, assigned after the whole run is estimated.
    pub band: ClvBand,
}

/// Quartile band over the run's CLV distribution: bottom quarter Low, top
/// quarter High, the middle half Medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClvBand {
    Low,
    Medium,
    High,
}

/// Estimate one customer. Non-finite or negative monetary is upstream
/// corruption and is rejected, not scored.
pub fn estimate(features: &CustomerFeatures) -> AnalyticsResult<f64> {
    if !features.monetary.is_finite() || features.monetary < 0.0 {
        return Err(AnalyticsError::InvalidFeature {
            customer_id: features.customer_id.clone(),
            field: "monetary",
            value: features.monetary,
        });
    }
    let tenure = features.tenure_days.max(1) as f64;
    Ok(features.monetary * features.frequency as f64 / tenure)
}

/// Estimate the full population and band each customer against it.
///
/// Per-customer failures are isolated into the returned failure list; they
/// should be impossible once the feature aggregator has run, but one bad
/// customer must not abort the rest.
pub fn estimate_population(
    features: &BTreeMap<CustomerId, CustomerFeatures>,
) -> (BTreeMap<CustomerId, ClvEstimate>, Vec<ScoringFailure>) {
    let mut raw: Vec<(CustomerId, f64)> = Vec::with_capacity(features.len());
    let mut failures = Vec::new();
    for f in features.values() {
        match estimate(f) {
            Ok(v) => raw.push((f.customer_id.clone(), v)),
            Err(e) => {
                log::warn!("clv: excluding customer {}: {e}", f.customer_id);
                failures.push(ScoringFailure {
                    customer_id: f.customer_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut sorted: Vec<f64> = raw.iter().map(|(_, v)| *v).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    // Too few customers to cut meaningful quartiles.
    let band_of: Box<dyn Fn(f64) -> ClvBand> = if sorted.len() < 4 {
        Box::new(|_| ClvBand::Medium)
    } else {
        let q25 = percentile(&sorted, 0.25);
        let q75 = percentile(&sorted, 0.75);
        Box::new(move |v| {
            if v <= q25 {
                ClvBand::Low
            } else if v >= q75 {
                ClvBand::High
            } else {
                ClvBand::Medium
            }
        })
    };

    let estimates = raw
        .into_iter()
        .map(|(id, clv)| {
            let band = band_of(clv);
            (
                id.clone(),
                ClvEstimate {
                    customer_id: id,
                    clv,
                    band,
                },
            )
        })
        .collect();
    (estimates, failures)
}

/// Linear-interpolated percentile of a pre-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = pos - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}
