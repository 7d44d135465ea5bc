//! Cohort retention — month-over-month active-customer retention.
//!
//! Independent of the scoring pipeline: consumes raw transactions only.
//! A retention rate of None means "no baseline" (first period, or the
//! previous period had nobody); it is never conflated with 0%, which is a
//! real measurement.

use crate::transaction::TransactionRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn of(date: chrono::NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub period: Period,
    pub active_customers: u64,
    /// Percent of the previous period's actives still active, 0–100+.
    /// None when no previous-period baseline exists.
    pub retention_rate: Option<f64>,
}

/// Compute the retention curve over every calendar month from the first to
/// the last transaction, inclusive. Gap months appear with zero actives.
pub fn retention_curve(transactions: &[TransactionRecord]) -> Vec<RetentionPoint> {
    let mut active: BTreeMap<Period, BTreeSet<&str>> = BTreeMap::new();
    for txn in transactions {
        active
            .entry(Period::of(txn.timestamp.date()))
            .or_default()
            .insert(txn.customer_id.as_str());
    }

    let (first, last) = match (active.keys().next(), active.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Vec::new(),
    };

    let mut points = Vec::new();
    let mut prev_count: Option<u64> = None;
    let mut period = first;
    loop {
        let count = active.get(&period).map(|s| s.len() as u64).unwrap_or(0);
        let retention_rate = match prev_count {
            Some(prev) if prev > 0 => Some(count as f64 / prev as f64 * 100.0),
            _ => None,
        };
        points.push(RetentionPoint {
            period,
            active_customers: count,
            retention_rate,
        });
        if period == last {
            break;
        }
        prev_count = Some(count);
        period = period.next();
    }
    points
}
