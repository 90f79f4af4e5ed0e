//! Rule evaluation: fixed, independent boolean predicates.
//!
//! RULES:
//!   - A rule reads derived features and batch thresholds only.
//!   - No rule reads another rule's vote.
//!   - The set is closed; new rules are appended to `RuleId`.

use crate::{
    config::RuleConfig,
    features::{BatchThresholds, DerivedFeatures},
    record::TransactionRecord,
};
use serde::{Deserialize, Serialize};

/// Every rule the evaluator knows, including the auxiliary deviation vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    StdDev,
    UnusualActivity,
    Large,
    Velocity,
    Time,
    MlAnomaly,
    Structuring,
    Deviation,
}

impl RuleId {
    pub const ALL: [RuleId; 8] = [
        RuleId::StdDev,
        RuleId::UnusualActivity,
        RuleId::Large,
        RuleId::Velocity,
        RuleId::Time,
        RuleId::MlAnomaly,
        RuleId::Structuring,
        RuleId::Deviation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::StdDev => "rule_std_dev",
            Self::UnusualActivity => "rule_unusual_activity",
            Self::Large => "rule_large",
            Self::Velocity => "rule_velocity",
            Self::Time => "rule_time",
            Self::MlAnomaly => "rule_ml_anomaly",
            Self::Structuring => "rule_structuring",
            Self::Deviation => "rule_deviation",
        }
    }

    /// Whether the vote counts toward the fusion vote sum.
    /// Structuring is evaluated and reported but never counted.
    pub fn counted_in_fusion(&self) -> bool {
        !matches!(self, Self::Structuring)
    }
}

/// The votes cast for one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVotes {
    pub rule_std_dev: bool,
    pub rule_unusual_activity: bool,
    pub rule_large: bool,
    pub rule_velocity: bool,
    pub rule_time: bool,
    pub rule_ml_anomaly: bool,
    pub rule_structuring: bool,
    pub rule_deviation: bool,
}

impl RuleVotes {
    pub fn get(&self, rule: RuleId) -> bool {
        match rule {
            RuleId::StdDev => self.rule_std_dev,
            RuleId::UnusualActivity => self.rule_unusual_activity,
            RuleId::Large => self.rule_large,
            RuleId::Velocity => self.rule_velocity,
            RuleId::Time => self.rule_time,
            RuleId::MlAnomaly => self.rule_ml_anomaly,
            RuleId::Structuring => self.rule_structuring,
            RuleId::Deviation => self.rule_deviation,
        }
    }

    /// Number of true votes among the rules counted in fusion.
    pub fn fusion_vote_count(&self) -> usize {
        RuleId::ALL
            .iter()
            .filter(|r| r.counted_in_fusion() && self.get(**r))
            .count()
    }
}

pub struct RuleEvaluator<'a> {
    config: &'a RuleConfig,
    thresholds: BatchThresholds,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(config: &'a RuleConfig, thresholds: BatchThresholds) -> Self {
        Self { config, thresholds }
    }

    /// Cast every vote for one row. `isolation_outlier` is the isolation
    /// estimator's discrete call, consumed as-is by the ML anomaly rule.
    pub fn evaluate(
        &self,
        record: &TransactionRecord,
        features: &DerivedFeatures,
        isolation_outlier: bool,
    ) -> RuleVotes {
        let c = self.config;
        let t = &self.thresholds;

        RuleVotes {
            rule_std_dev: features.amt_z_score.abs() > c.z_score_limit,
            rule_unusual_activity: features.user_txn_count as f64 > t.txn_count_p98,
            rule_large: record.amount
                > features.user_mean_amount
                    + c.large_amount_std_multiplier * features.user_std_amount,
            rule_velocity: features.velocity_streak > c.velocity_streak_limit,
            rule_time: c.odd_hours.contains(&features.txn_hour),
            rule_ml_anomaly: isolation_outlier,
            rule_structuring: features.small_streak >= c.structuring_streak_min,
            rule_deviation: features.merchant_is_rare && record.amount > t.amount_p85,
        }
    }
}
