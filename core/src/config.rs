use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};

// ── Rule thresholds ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Rule A: |z| above this votes std-dev outlier.
    pub z_score_limit: f64,
    /// Rule B: quantile of `user_txn_count` that marks unusual volume.
    pub volume_quantile: f64,
    /// Rule C: amount above mean + k * std votes large.
    pub large_amount_std_multiplier: f64,
    /// Rule D: gap (seconds) under which consecutive transactions are "fast".
    pub velocity_gap_secs: f64,
    /// Rule D: streak length above which velocity votes.
    pub velocity_streak_limit: u32,
    /// Rule E: hours of day (0-23) considered odd.
    pub odd_hours: Vec<u32>,
    /// Rule G: amounts strictly below this count toward a small streak.
    pub small_amount_limit: f64,
    /// Rule G: streak length at or above which structuring votes.
    pub structuring_streak_min: u32,
    /// Deviation: merchants at or below this quantile of occurrence counts are rare.
    pub rare_merchant_quantile: f64,
    /// Deviation: amount must exceed this quantile of the batch's amounts.
    pub deviation_amount_quantile: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            z_score_limit: 2.5,
            volume_quantile: 0.98,
            large_amount_std_multiplier: 2.5,
            velocity_gap_secs: 300.0,
            velocity_streak_limit: 4,
            odd_hours: vec![0, 1, 2, 3, 4],
            small_amount_limit: 5.0,
            structuring_streak_min: 2,
            rare_merchant_quantile: 0.05,
            deviation_amount_quantile: 0.85,
        }
    }
}

// ── Density estimator ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    pub n_components: usize,
    /// EM stops once the mean log-likelihood improves by less than this.
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            n_components: 4,
            tolerance: 1e-3,
            max_iter: 100,
        }
    }
}

// ── Isolation estimator ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub n_trees: usize,
    /// Upper bound on rows drawn per tree.
    pub max_samples: usize,
    /// Expected share of outliers in the batch; sets the decision offset.
    pub contamination: f64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.005,
        }
    }
}

// ── Decision fusion ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Quantile of labeled-fraud risk scores used as the fraud threshold.
    pub calibration_quantile: f64,
    /// Flag when more than this many counted rule votes fire.
    pub vote_limit: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            calibration_quantile: 0.85,
            vote_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Master seed for every estimator's RNG stream.
    pub seed: u64,
    pub rules: RuleConfig,
    pub density: DensityConfig,
    pub isolation: IsolationConfig,
    pub fusion: FusionConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            rules: RuleConfig::default(),
            density: DensityConfig::default(),
            isolation: IsolationConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load from a JSON file. Omitted fields keep their defaults.
    pub fn load(path: &str) -> ScanResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ScanConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject values no scan can run with.
    pub fn validate(&self) -> ScanResult<()> {
        let quantiles = [
            ("rules.volume_quantile", self.rules.volume_quantile),
            ("rules.rare_merchant_quantile", self.rules.rare_merchant_quantile),
            ("rules.deviation_amount_quantile", self.rules.deviation_amount_quantile),
            ("isolation.contamination", self.isolation.contamination),
            ("fusion.calibration_quantile", self.fusion.calibration_quantile),
        ];
        for (name, q) in quantiles {
            if !(0.0..=1.0).contains(&q) {
                return Err(ScanError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {q}"
                )));
            }
        }
        if self.isolation.contamination > 0.5 {
            return Err(ScanError::InvalidConfig(format!(
                "isolation.contamination must be at most 0.5, got {}",
                self.isolation.contamination
            )));
        }
        if self.density.n_components == 0 {
            return Err(ScanError::InvalidConfig("density.n_components must be > 0".into()));
        }
        if self.density.max_iter == 0 || self.density.tolerance <= 0.0 {
            return Err(ScanError::InvalidConfig(
                "density.max_iter and density.tolerance must be > 0".into(),
            ));
        }
        if self.isolation.n_trees == 0 || self.isolation.max_samples == 0 {
            return Err(ScanError::InvalidConfig(
                "isolation.n_trees and isolation.max_samples must be > 0".into(),
            ));
        }
        if let Some(h) = self.rules.odd_hours.iter().find(|&&h| h > 23) {
            return Err(ScanError::InvalidConfig(format!(
                "rules.odd_hours contains {h}, hours run 0-23"
            )));
        }
        if self.rules.velocity_gap_secs <= 0.0 {
            return Err(ScanError::InvalidConfig("rules.velocity_gap_secs must be > 0".into()));
        }
        Ok(())
    }
}
