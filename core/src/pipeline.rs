//! The scoring pipeline: one batch in, one scored batch out.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Reference resolver  (merchant / category consistency)
//!   2. Feature deriver     (per-row and per-user features, batch thresholds)
//!   3. Anomaly scorer      (density + isolation, fit once on the whole batch)
//!   4. Rule evaluator      (independent votes)
//!   5. Decision fuser      (calibrate on labeled fraud, then flag)
//!
//! RULES:
//!   - Input records are never mutated; each stage returns new values.
//!   - Batch thresholds are computed once and passed forward explicitly.
//!   - Any fatal error aborts the whole run; there is no partial output.
//!   - All randomness flows through the RngBank seeded from the config.

use crate::{
    anomaly,
    category::CategoryDictionary,
    config::ScanConfig,
    error::ScanResult,
    evaluation::ConfusionMatrix,
    features::{self, BatchThresholds, DerivedFeatures},
    fusion::{self, DecisionFuser},
    record::{self, RawTransaction, TransactionRecord},
    rules::{RuleEvaluator, RuleId, RuleVotes},
};
use serde::{Deserialize, Serialize};

/// A record with every derived column, vote, score and the final flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    pub record: TransactionRecord,
    pub mcc_valid: bool,
    pub features: DerivedFeatures,
    pub votes: RuleVotes,
    pub density_score: f64,
    pub isolation_score: f64,
    pub isolation_outlier: bool,
    pub fraud_risk_score: f64,
    pub is_fraud_flagged: bool,
}

#[derive(Debug, Clone)]
pub struct ScoredBatch {
    /// All rows, in input order.
    pub rows: Vec<ScoredTransaction>,
    pub thresholds: BatchThresholds,
    pub fraud_threshold: f64,
}

impl ScoredBatch {
    /// Flagged rows only, in input order.
    pub fn flagged(&self) -> Vec<&ScoredTransaction> {
        self.rows.iter().filter(|r| r.is_fraud_flagged).collect()
    }

    pub fn flagged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_fraud_flagged).count()
    }

    /// Number of true votes per rule across the batch, in `RuleId::ALL` order.
    pub fn rule_hits(&self) -> Vec<(RuleId, usize)> {
        RuleId::ALL
            .iter()
            .map(|&rule| {
                let hits = self.rows.iter().filter(|r| r.votes.get(rule)).count();
                (rule, hits)
            })
            .collect()
    }

    /// Flags vs. ground truth; None when no row carries a label.
    pub fn evaluation(&self) -> Option<ConfusionMatrix> {
        let m = ConfusionMatrix::from_pairs(
            self.rows
                .iter()
                .map(|r| (r.is_fraud_flagged, r.record.is_fraud)),
        );
        (m.labeled() > 0).then_some(m)
    }
}

pub struct ScanPipeline {
    config: ScanConfig,
    categories: CategoryDictionary,
}

impl ScanPipeline {
    /// Validates the config up front so a bad value fails before any work.
    pub fn new(config: ScanConfig, categories: CategoryDictionary) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self { config, categories })
    }

    /// Validate raw rows, then score them.
    pub fn score_raw(&self, raw: Vec<RawTransaction>) -> ScanResult<ScoredBatch> {
        let records = record::validate_all(raw)?;
        self.score(records)
    }

    pub fn score(&self, records: Vec<TransactionRecord>) -> ScanResult<ScoredBatch> {
        log::info!(
            "scan: {} rows, {} category codes, seed {}",
            records.len(),
            self.categories.len(),
            self.config.seed
        );

        // 1. Reference resolver
        let mcc_valid: Vec<bool> = records
            .iter()
            .map(|r| {
                self.categories
                    .validate(r.merchant_category_code, &r.merchant_name)
            })
            .collect();

        // 2. Feature deriver
        let table = features::derive(&records, &self.config.rules);

        // 3. Anomaly scorer
        let matrix = anomaly::feature_matrix(&records, &table.rows);
        let scores = anomaly::score(&matrix, &self.config)?;

        // 4. Rule evaluator
        let evaluator = RuleEvaluator::new(&self.config.rules, table.thresholds);
        let votes: Vec<RuleVotes> = records
            .iter()
            .zip(&table.rows)
            .zip(&scores.isolation_outlier)
            .map(|((r, f), &outlier)| evaluator.evaluate(r, f, outlier))
            .collect();

        // 5. Decision fuser
        let risk: Vec<f64> = scores
            .density_score
            .iter()
            .zip(&scores.isolation_score)
            .map(|(&d, &i)| fusion::risk_score(d, i))
            .collect();
        let labels: Vec<Option<bool>> = records.iter().map(|r| r.is_fraud).collect();
        let fuser = DecisionFuser::calibrate(&risk, &labels, &self.config.fusion)?;
        log::info!("fusion: fraud threshold {:.4}", fuser.fraud_threshold);

        let rows: Vec<ScoredTransaction> = records
            .into_iter()
            .zip(mcc_valid)
            .zip(table.rows)
            .zip(votes)
            .enumerate()
            .map(|(i, (((record, mcc_valid), features), votes))| {
                let outlier = scores.isolation_outlier[i];
                ScoredTransaction {
                    record,
                    mcc_valid,
                    features,
                    votes,
                    density_score: scores.density_score[i],
                    isolation_score: scores.isolation_score[i],
                    isolation_outlier: outlier,
                    fraud_risk_score: risk[i],
                    is_fraud_flagged: fuser.flag(&votes, risk[i], outlier),
                }
            })
            .collect();

        let batch = ScoredBatch {
            rows,
            thresholds: table.thresholds,
            fraud_threshold: fuser.fraud_threshold,
        };
        log::info!(
            "scan: flagged {} of {} rows",
            batch.flagged_count(),
            batch.rows.len()
        );
        Ok(batch)
    }
}
