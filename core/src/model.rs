//! Member classifiers for the churn ensemble.
//!
//! Each classifier is a small, fully deterministic binary estimator exposing
//! the same two-call contract the engine requires of any external model:
//! `fit(features, labels)` then `predict_proba(features)`. The engine never
//! inspects what is behind the contract — the ensemble treats every member
//! as a black box and averages their probabilities.
//!
//! Members are an enum rather than trait objects so a trained ensemble can
//! round-trip through serde at the persistence boundary.

use crate::{config::TrainingConfig, error::AnalyticsResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierKind {
    Logistic(LogisticModel),
    GaussianNb(GaussianNbModel),
    NearestCentroid(CentroidModel),
}

impl ClassifierKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Logistic(_) => "logistic",
            Self::GaussianNb(_) => "gaussian_nb",
            Self::NearestCentroid(_) => "nearest_centroid",
        }
    }

    pub fn fit(
        &mut self,
        rows: &[Vec<f64>],
        labels: &[bool],
        training: &TrainingConfig,
    ) -> AnalyticsResult<()> {
        match self {
            Self::Logistic(m) => m.fit(rows, labels, training),
            Self::GaussianNb(m) => m.fit(rows, labels),
            Self::NearestCentroid(m) => m.fit(rows, labels),
        }
    }

    /// Probability of churn for one (already standardized) feature row.
    pub fn predict_proba(&self, row: &[f64]) -> AnalyticsResult<f64> {
        match self {
            Self::Logistic(m) => m.predict_proba(row),
            Self::GaussianNb(m) => m.predict_proba(row),
            Self::NearestCentroid(m) => m.predict_proba(row),
        }
    }
}

/// The default ensemble roster, untrained.
pub fn default_members() -> Vec<ClassifierKind> {
    vec![
        ClassifierKind::Logistic(LogisticModel::default()),
        ClassifierKind::GaussianNb(GaussianNbModel::default()),
        ClassifierKind::NearestCentroid(CentroidModel::default()),
    ]
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn not_fitted(name: &str) -> crate::error::AnalyticsError {
    anyhow::anyhow!("classifier '{name}' used before fit").into()
}

// ── Logistic regression ──────────────────────────────────────────────────────

/// Batch-gradient logistic regression. Deterministic: no random init, no
/// stochastic minibatches — the same training set always yields the same
/// weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
    fitted: bool,
}

impl LogisticModel {
    fn fit(
        &mut self,
        rows: &[Vec<f64>],
        labels: &[bool],
        training: &TrainingConfig,
    ) -> AnalyticsResult<()> {
        let n = rows.len();
        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        self.weights = vec![0.0; dims];
        self.bias = 0.0;

        for _ in 0..training.epochs {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;
            for (row, &label) in rows.iter().zip(labels) {
                let z = self.bias + dot(&self.weights, row);
                let err = sigmoid(z) - if label { 1.0 } else { 0.0 };
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }
            let scale = training.learning_rate / n as f64;
            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= scale * g;
            }
            self.bias -= scale * grad_b;
        }
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> AnalyticsResult<f64> {
        if !self.fitted {
            return Err(not_fitted("logistic"));
        }
        Ok(sigmoid(self.bias + dot(&self.weights, row)))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ── Gaussian naive Bayes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianNbModel {
    prior_churn: f64,
    churn_mean: Vec<f64>,
    churn_var: Vec<f64>,
    active_mean: Vec<f64>,
    active_var: Vec<f64>,
    /// Set when training data had a single class: predict the prior flat.
    constant: Option<f64>,
    fitted: bool,
}

const VAR_FLOOR: f64 = 1e-6;

impl GaussianNbModel {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[bool]) -> AnalyticsResult<()> {
        let n_churn = labels.iter().filter(|&&l| l).count();
        let n_active = labels.len() - n_churn;
        self.prior_churn = n_churn as f64 / labels.len() as f64;

        if n_churn == 0 || n_active == 0 {
            self.constant = Some(self.prior_churn);
            self.fitted = true;
            return Ok(());
        }
        self.constant = None;

        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let (churn_rows, active_rows): (Vec<_>, Vec<_>) = rows
            .iter()
            .zip(labels)
            .partition(|(_, l)| **l);
        let churn_rows: Vec<&Vec<f64>> = churn_rows.into_iter().map(|(r, _)| r).collect();
        let active_rows: Vec<&Vec<f64>> = active_rows.into_iter().map(|(r, _)| r).collect();

        let (cm, cv) = mean_var(&churn_rows, dims);
        let (am, av) = mean_var(&active_rows, dims);
        self.churn_mean = cm;
        self.churn_var = cv;
        self.active_mean = am;
        self.active_var = av;
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> AnalyticsResult<f64> {
        if !self.fitted {
            return Err(not_fitted("gaussian_nb"));
        }
        if let Some(p) = self.constant {
            return Ok(p);
        }
        let ll_churn = self.prior_churn.max(1e-12).ln()
            + log_likelihood(row, &self.churn_mean, &self.churn_var);
        let ll_active = (1.0 - self.prior_churn).max(1e-12).ln()
            + log_likelihood(row, &self.active_mean, &self.active_var);
        // Stable two-class softmax.
        let m = ll_churn.max(ll_active);
        let e_churn = (ll_churn - m).exp();
        let e_active = (ll_active - m).exp();
        Ok(e_churn / (e_churn + e_active))
    }
}

fn mean_var(rows: &[&Vec<f64>], dims: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut mean = vec![0.0; dims];
    for row in rows {
        for (m, x) in mean.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= n;
    }
    let mut var = vec![0.0; dims];
    for row in rows {
        for ((v, x), m) in var.iter_mut().zip(row.iter()).zip(&mean) {
            *v += (x - m) * (x - m);
        }
    }
    for v in &mut var {
        *v = (*v / n).max(VAR_FLOOR);
    }
    (mean, var)
}

fn log_likelihood(row: &[f64], mean: &[f64], var: &[f64]) -> f64 {
    row.iter()
        .zip(mean)
        .zip(var)
        .map(|((x, m), v)| {
            -0.5 * ((2.0 * std::f64::consts::PI * v).ln() + (x - m) * (x - m) / v)
        })
        .sum()
}

// ── Nearest centroid ─────────────────────────────────────────────────────────

/// Distance-to-centroid classifier: probability rises as a row sits closer
/// to the churned centroid than the active one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CentroidModel {
    churn_centroid: Vec<f64>,
    active_centroid: Vec<f64>,
    constant: Option<f64>,
    fitted: bool,
}

impl CentroidModel {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[bool]) -> AnalyticsResult<()> {
        let n_churn = labels.iter().filter(|&&l| l).count();
        let n_active = labels.len() - n_churn;
        if n_churn == 0 || n_active == 0 {
            self.constant = Some(n_churn as f64 / labels.len() as f64);
            self.fitted = true;
            return Ok(());
        }
        self.constant = None;

        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut churn_c = vec![0.0; dims];
        let mut active_c = vec![0.0; dims];
        for (row, &label) in rows.iter().zip(labels) {
            let target = if label { &mut churn_c } else { &mut active_c };
            for (c, x) in target.iter_mut().zip(row) {
                *c += x;
            }
        }
        for c in &mut churn_c {
            *c /= n_churn as f64;
        }
        for c in &mut active_c {
            *c /= n_active as f64;
        }
        self.churn_centroid = churn_c;
        self.active_centroid = active_c;
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> AnalyticsResult<f64> {
        if !self.fitted {
            return Err(not_fitted("nearest_centroid"));
        }
        if let Some(p) = self.constant {
            return Ok(p);
        }
        let d_churn = euclidean(row, &self.churn_centroid);
        let d_active = euclidean(row, &self.active_centroid);
        Ok(sigmoid(d_active - d_churn))
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
