//! Decision fusion: rule votes plus calibrated anomaly score into one flag.
//!
//! flagged = (counted votes > vote_limit)
//!        OR (risk score > fraud_threshold AND isolation outlier)
//!
//! The fraud threshold comes only from rows labeled as fraud. A batch
//! without any cannot be calibrated and the scan fails.

use crate::{
    config::FusionConfig,
    error::{ScanError, ScanResult},
    rules::RuleVotes,
    stats,
};

/// Both inputs are already oriented "higher = more anomalous".
pub fn risk_score(density_score: f64, isolation_score: f64) -> f64 {
    density_score + isolation_score
}

/// The `quantile` of risk scores over rows labeled `Some(true)`.
pub fn calibrate_threshold(
    risk_scores: &[f64],
    labels: &[Option<bool>],
    quantile: f64,
) -> ScanResult<f64> {
    let labeled_fraud: Vec<f64> = risk_scores
        .iter()
        .zip(labels)
        .filter(|(_, label)| **label == Some(true))
        .map(|(s, _)| *s)
        .collect();
    stats::quantile(&labeled_fraud, quantile).ok_or(ScanError::CalibrationUnavailable)
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionFuser {
    pub fraud_threshold: f64,
    pub vote_limit: usize,
}

impl DecisionFuser {
    pub fn new(fraud_threshold: f64, config: &FusionConfig) -> Self {
        Self {
            fraud_threshold,
            vote_limit: config.vote_limit,
        }
    }

    /// Calibrate against the labeled subset, then build the fuser.
    pub fn calibrate(
        risk_scores: &[f64],
        labels: &[Option<bool>],
        config: &FusionConfig,
    ) -> ScanResult<Self> {
        let threshold = calibrate_threshold(risk_scores, labels, config.calibration_quantile)?;
        Ok(Self::new(threshold, config))
    }

    pub fn flag(&self, votes: &RuleVotes, risk_score: f64, isolation_outlier: bool) -> bool {
        votes.fusion_vote_count() > self.vote_limit
            || (risk_score > self.fraud_threshold && isolation_outlier)
    }
}
