//! Shared primitive types used across the entire engine.

/// A stable, unique identifier for a customer.
///
/// Scores and segments are keyed by this, and quantile tie-breaks sort by it,
/// so it must be stable across runs for the same snapshot.
pub type CustomerId = String;

/// A stable, unique identifier for a product.
pub type ProductId = String;
