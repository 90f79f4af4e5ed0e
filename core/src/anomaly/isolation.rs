//! Isolation forest outlier estimator.
//!
//! The forest is aprender's. Its raw `score_samples` are lower for rows
//! that isolate in fewer splits. The decision offset is the contamination
//! quantile of the training rows' raw scores, so a row is an outlier iff
//! its raw score falls below that offset.

use super::to_matrix;
use crate::{
    config::IsolationConfig,
    error::{ScanError, ScanResult},
    rng::EstimatorRng,
    stats,
};
use aprender::prelude::*;

const ESTIMATOR: &str = "isolation";

pub struct IsolationEstimator {
    forest: IsolationForest,
    /// Raw scores below this are outliers.
    offset: f64,
}

impl IsolationEstimator {
    pub fn fit(
        data: &[Vec<f64>],
        config: &IsolationConfig,
        rng: &mut EstimatorRng,
    ) -> ScanResult<Self> {
        let n = data.len();
        if n == 0 {
            return Err(ScanError::DataInsufficient {
                estimator: ESTIMATOR,
                rows: 0,
                required: 1,
            });
        }

        let x = to_matrix(data, ESTIMATOR)?;
        let sample_size = config.max_samples.min(n);
        let seed = rng.next_seed();
        let mut forest = IsolationForest::new()
            .with_n_estimators(config.n_trees)
            .with_max_samples(sample_size)
            .with_contamination(config.contamination as f32)
            .with_random_state(seed);
        forest.fit(&x).map_err(|e| ScanError::Numerical {
            estimator: ESTIMATOR,
            detail: e.to_string(),
        })?;

        let mut estimator = Self { forest, offset: 0.0 };
        let train_scores = estimator.raw_scores(data)?;
        estimator.offset = stats::quantile(&train_scores, config.contamination).unwrap_or(0.0);

        log::debug!(
            "{}: {} trees, subsample {sample_size}, offset {:.5}",
            rng.name,
            config.n_trees,
            estimator.offset
        );
        Ok(estimator)
    }

    /// aprender's `score_samples`, widened to f64: the lower, the more anomalous.
    pub fn raw_scores(&self, data: &[Vec<f64>]) -> ScanResult<Vec<f64>> {
        let x = to_matrix(data, ESTIMATOR)?;
        Ok(self
            .forest
            .score_samples(&x)
            .iter()
            .map(|&s| s as f64)
            .collect())
    }

    /// Raw score shifted by the offset and negated, so higher means more
    /// anomalous and anything above 0 is an outlier.
    pub fn isolation_scores(&self, data: &[Vec<f64>]) -> ScanResult<Vec<f64>> {
        Ok(self
            .raw_scores(data)?
            .into_iter()
            .map(|s| self.offset - s)
            .collect())
    }
}
