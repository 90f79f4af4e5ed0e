//! Anomaly scoring: two unsupervised estimators over one feature matrix.
//!
//! Both estimators are fit exactly once per batch, each seeded from its
//! own RNG slot so their draws never interleave. Scores are oriented so
//! that higher means more anomalous.

pub mod gmm;
pub mod isolation;

pub use gmm::DensityEstimator;
pub use isolation::IsolationEstimator;

use crate::{
    config::ScanConfig,
    error::{ScanError, ScanResult},
    features::DerivedFeatures,
    record::TransactionRecord,
    rng::{EstimatorSlot, RngBank},
};
use aprender::prelude::Matrix;

/// Estimator input row for one transaction:
/// `[amount, txn_hour, txn_dow, amt_to_avg_ratio]`, non-finite values as 0.
pub fn feature_vector(record: &TransactionRecord, features: &DerivedFeatures) -> Vec<f64> {
    [
        record.amount,
        features.txn_hour as f64,
        features.txn_dow as f64,
        features.amt_to_avg_ratio,
    ]
    .into_iter()
    .map(|v| if v.is_finite() { v } else { 0.0 })
    .collect()
}

pub fn feature_matrix(records: &[TransactionRecord], features: &[DerivedFeatures]) -> Vec<Vec<f64>> {
    records
        .iter()
        .zip(features)
        .map(|(r, f)| feature_vector(r, f))
        .collect()
}

/// Row-major f32 matrix in the layout aprender's estimators take.
fn to_matrix(rows: &[Vec<f64>], estimator: &'static str) -> ScanResult<Matrix<f32>> {
    let n_cols = rows.first().map_or(0, Vec::len);
    let flat: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
    Matrix::from_vec(rows.len(), n_cols, flat).map_err(|e| ScanError::Numerical {
        estimator,
        detail: e.to_string(),
    })
}

/// Per-row estimator output, in matrix row order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyScores {
    /// Negative log-likelihood under the mixture.
    pub density_score: Vec<f64>,
    /// Negated, offset-shifted isolation score.
    pub isolation_score: Vec<f64>,
    pub isolation_outlier: Vec<bool>,
}

impl AnomalyScores {
    pub fn outlier_count(&self) -> usize {
        self.isolation_outlier.iter().filter(|&&o| o).count()
    }
}

/// Both estimators, fit on one batch.
pub struct AnomalyModel {
    density: DensityEstimator,
    isolation: IsolationEstimator,
}

impl AnomalyModel {
    pub fn fit(matrix: &[Vec<f64>], config: &ScanConfig) -> ScanResult<Self> {
        let bank = RngBank::new(config.seed);

        let mut density_rng = bank.for_estimator(EstimatorSlot::Density);
        let density = DensityEstimator::fit(matrix, &config.density, &mut density_rng)?;

        let mut isolation_rng = bank.for_estimator(EstimatorSlot::Isolation);
        let isolation = IsolationEstimator::fit(matrix, &config.isolation, &mut isolation_rng)?;

        Ok(Self { density, isolation })
    }

    /// Score rows against the fitted estimators. The rows need not be the
    /// ones the model was fit on.
    pub fn score(&self, matrix: &[Vec<f64>]) -> ScanResult<AnomalyScores> {
        let density_score = self
            .density
            .log_likelihoods(matrix)?
            .into_iter()
            .map(|ll| -ll)
            .collect();
        let isolation_score = self.isolation.isolation_scores(matrix)?;
        let isolation_outlier = isolation_score.iter().map(|&s| s > 0.0).collect();
        Ok(AnomalyScores {
            density_score,
            isolation_score,
            isolation_outlier,
        })
    }
}

/// Fit both estimators on `matrix` and score every row of it.
pub fn score(matrix: &[Vec<f64>], config: &ScanConfig) -> ScanResult<AnomalyScores> {
    let model = AnomalyModel::fit(matrix, config)?;
    let scores = model.score(matrix)?;
    log::info!(
        "anomaly: fit {} components, {} trees; {} isolation outliers of {} rows",
        model.density.n_components(),
        config.isolation.n_trees,
        scores.outlier_count(),
        matrix.len()
    );
    Ok(scores)
}
