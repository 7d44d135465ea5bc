//! ShopLens core — customer analytics and scoring engine.
//!
//! Takes a snapshot of raw e-commerce transactions and derives, per customer:
//! behavioral features, RFM quantile scores, a named segment, a lifetime-value
//! estimate, and a calibrated churn-risk probability. A cohort calculator
//! derives month-over-month retention from the same snapshot.
//!
//! Everything is a pure batch transformation over the snapshot passed in.
//! The engine owns no storage, no network and no UI; ingestion, persistence
//! and reporting are external collaborators.

pub mod churn;
pub mod clv;
pub mod cohort;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod rfm;
pub mod rng;
pub mod sample;
pub mod segment;
pub mod transaction;
pub mod types;
