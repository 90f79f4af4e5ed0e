//! Gaussian mixture density estimator, full covariance, fit by EM.
//!
//! The mixture is aprender's; this wrapper owns the row-count check, the
//! seed, and the per-row log-likelihood used as the density score.

use super::to_matrix;
use crate::{
    config::DensityConfig,
    error::{ScanError, ScanResult},
    rng::EstimatorRng,
};
use aprender::cluster::{CovarianceType, GaussianMixture};
use aprender::prelude::*;

const ESTIMATOR: &str = "density";

pub struct DensityEstimator {
    mixture: GaussianMixture,
    n_components: usize,
}

impl DensityEstimator {
    pub fn fit(
        data: &[Vec<f64>],
        config: &DensityConfig,
        rng: &mut EstimatorRng,
    ) -> ScanResult<Self> {
        let k = config.n_components;
        if data.is_empty() || data.len() < k {
            return Err(ScanError::DataInsufficient {
                estimator: ESTIMATOR,
                rows: data.len(),
                required: k.max(1),
            });
        }

        let x = to_matrix(data, ESTIMATOR)?;
        let seed = rng.next_seed();
        let mut mixture = GaussianMixture::new(k, CovarianceType::Full)
            .with_max_iter(config.max_iter)
            .with_tol(config.tolerance as f32)
            .with_random_state(seed);
        mixture.fit(&x).map_err(|e| ScanError::Numerical {
            estimator: ESTIMATOR,
            detail: e.to_string(),
        })?;

        log::debug!(
            "{}: fit {k} components on {} rows, seed {seed:#018x}",
            rng.name,
            data.len()
        );
        Ok(Self {
            mixture,
            n_components: k,
        })
    }

    /// log p(x) for every row. A non-finite likelihood fails the scan
    /// instead of being replaced by a default.
    pub fn log_likelihoods(&self, data: &[Vec<f64>]) -> ScanResult<Vec<f64>> {
        data.iter()
            .enumerate()
            .map(|(row, x)| {
                let single = to_matrix(std::slice::from_ref(x), ESTIMATOR)?;
                let ll = self.mixture.score(&single) as f64;
                if ll.is_finite() {
                    Ok(ll)
                } else {
                    Err(ScanError::Numerical {
                        estimator: ESTIMATOR,
                        detail: format!("log-likelihood of row {row} is {ll}"),
                    })
                }
            })
            .collect()
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{EstimatorSlot, RngBank};

    fn two_blobs() -> Vec<Vec<f64>> {
        let mut data = Vec::new();
        for i in 0..40 {
            let jitter = (i % 7) as f64 * 0.1;
            data.push(vec![1.0 + jitter, 2.0 - jitter]);
            data.push(vec![10.0 - jitter, 12.0 + jitter]);
        }
        data
    }

    fn config(k: usize) -> DensityConfig {
        DensityConfig {
            n_components: k,
            ..DensityConfig::default()
        }
    }

    #[test]
    fn too_few_rows_is_data_insufficient() {
        let mut rng = RngBank::new(1).for_estimator(EstimatorSlot::Density);
        let data = vec![vec![1.0, 2.0]; 3];
        match DensityEstimator::fit(&data, &config(4), &mut rng) {
            Err(ScanError::DataInsufficient { rows, required, .. }) => {
                assert_eq!(rows, 3);
                assert_eq!(required, 4);
            }
            Err(other) => panic!("expected DataInsufficient, got {other:?}"),
            Ok(_) => panic!("expected DataInsufficient, got a fitted mixture"),
        }
    }

    #[test]
    fn far_point_is_less_likely() {
        let data = two_blobs();
        let mut rng = RngBank::new(42).for_estimator(EstimatorSlot::Density);
        let density = DensityEstimator::fit(&data, &config(2), &mut rng).unwrap();
        let ll = density
            .log_likelihoods(&[vec![1.2, 1.8], vec![50.0, -30.0]])
            .unwrap();
        assert!(ll[0] > ll[1], "near={} far={}", ll[0], ll[1]);
        assert_eq!(density.n_components(), 2);
    }

    #[test]
    fn same_stream_gives_same_likelihoods() {
        let data = two_blobs();
        let fit = || {
            let mut rng = RngBank::new(9).for_estimator(EstimatorSlot::Density);
            DensityEstimator::fit(&data, &config(2), &mut rng)
                .unwrap()
                .log_likelihoods(&data)
                .unwrap()
        };
        let a: Vec<u64> = fit().iter().map(|v| v.to_bits()).collect();
        let b: Vec<u64> = fit().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);
    }
}
