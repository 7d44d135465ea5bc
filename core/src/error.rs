use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// A customer with zero transactions reached the feature aggregator.
    /// Caller error: such customers must be excluded upstream, never
    /// silently defaulted to zero recency.
    #[error("customer '{customer_id}' has no transaction history")]
    EmptyHistory { customer_id: String },

    /// A numeric feature is negative or NaN. Indicates upstream data
    /// corruption, since input is contractually pre-validated.
    #[error("invalid feature for customer '{customer_id}': {field} = {value}")]
    InvalidFeature {
        customer_id: String,
        field: &'static str,
        value: f64,
    },

    /// The whole run has nothing scorable. Fatal, aborts the run.
    #[error("population is empty: no scorable customers in snapshot")]
    EmptyPopulation,

    /// A dimension has too few distinct values for the requested bin count.
    /// Recovered internally by bin collapsing; never surfaced to callers.
    #[error("degenerate distribution: {distinct} distinct values for {requested} bins")]
    DegenerateDistribution { distinct: usize, requested: usize },

    /// No trained ensemble and not enough labels to train one. Recovered
    /// internally via the rule-based fallback; surfaced only as a
    /// `degraded` flag on the result.
    #[error("churn model unavailable: {labeled} labeled examples, {required} required")]
    ModelUnavailable { labeled: usize, required: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
