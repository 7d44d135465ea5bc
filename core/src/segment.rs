//! Rule-based segment classification.
//!
//! Classification is an ORDERED rule table: first match wins, no
//! fallthrough once matched. The order encodes business priority — a
//! customer satisfying several rules is classified by the earliest, most
//! valuable match. Reordering the table silently changes outcomes, so the
//! default table below is fixed and covered by tests.

use crate::rfm::RfmScore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    Loyal,
    AtRisk,
    New,
    Lost,
    /// Reachable only through custom rule tables; the default table never
    /// emits it.
    Other,
}

impl Segment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::Loyal => "Loyal",
            Self::AtRisk => "At Risk",
            Self::New => "New",
            Self::Lost => "Lost",
            Self::Other => "Other",
        }
    }
}

/// One row of the table: minimum r/f/m scores that must all hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentRule {
    pub min_r: u8,
    pub min_f: u8,
    pub min_m: u8,
    pub segment: Segment,
}

impl SegmentRule {
    fn matches(&self, score: &RfmScore) -> bool {
        score.r_score >= self.min_r && score.f_score >= self.min_f && score.m_score >= self.min_m
    }
}

/// An ordered rule table with a fallback segment for customers matching
/// nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRules {
    pub rules: Vec<SegmentRule>,
    pub fallback: Segment,
}

impl Default for SegmentRules {
    /// The standard table. Evaluation order is load-bearing: a customer
    /// matching several rows is classified by the earliest match, and
    /// reordering silently changes outcomes.
    fn default() -> Self {
        Self {
            rules: vec![
                SegmentRule { min_r: 4, min_f: 4, min_m: 4, segment: Segment::Champions },
                SegmentRule { min_r: 3, min_f: 3, min_m: 3, segment: Segment::Loyal },
                SegmentRule { min_r: 3, min_f: 1, min_m: 1, segment: Segment::AtRisk },
                SegmentRule { min_r: 4, min_f: 1, min_m: 1, segment: Segment::New },
            ],
            fallback: Segment::Lost,
        }
    }
}

impl SegmentRules {
    /// Pure function: the same score always yields the same segment.
    pub fn classify(&self, score: &RfmScore) -> Segment {
        for rule in &self.rules {
            if rule.matches(score) {
                return rule.segment;
            }
        }
        self.fallback
    }
}

/// Classify with the standard table.
pub fn classify(score: &RfmScore) -> Segment {
    SegmentRules::default().classify(score)
}
