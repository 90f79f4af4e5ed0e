//! Feature derivation: per-transaction and per-user aggregates.
//!
//! ORDER (fixed, later steps read earlier ones):
//!   1. hour of day, day of week
//!   2. per-user mean and sample std of amount
//!   3. amount-to-average ratio
//!   4. amount z-score
//!   5. per-user transaction count and its batch p98
//!   6. time since previous transaction and velocity streak (time-ordered)
//!   7. small-amount streak (time-ordered)
//!   8. merchant occurrence counts and rarity
//!
//! Aggregates cover exactly the rows sharing a user_id in this batch.
//! Rows are returned in original order regardless of the time ordering
//! used internally by steps 6 and 7.

use crate::{
    config::RuleConfig,
    record::TransactionRecord,
    stats,
    types::RowIndex,
};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Derived columns for a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub txn_hour: u32,
    /// Monday = 0.
    pub txn_dow: u32,
    pub user_mean_amount: f64,
    /// Sample std; 0 for users with a single transaction.
    pub user_std_amount: f64,
    pub amt_to_avg_ratio: f64,
    pub amt_z_score: f64,
    pub user_txn_count: usize,
    /// Seconds since the user's previous transaction; None for the first.
    pub time_since_prev: Option<f64>,
    /// Transactions in the current run of consecutive fast gaps, this one included.
    pub velocity_streak: u32,
    /// Consecutive small-amount transactions ending here; 0 if this one isn't small.
    pub small_streak: u32,
    pub merchant_count: usize,
    pub merchant_is_rare: bool,
}

/// Batch-wide scalars, computed once and passed to the rule evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchThresholds {
    pub txn_count_p98: f64,
    pub merchant_count_p5: f64,
    pub amount_p85: f64,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// One entry per input record, same order.
    pub rows: Vec<DerivedFeatures>,
    pub thresholds: BatchThresholds,
}

#[derive(Debug, Clone, Copy, Default)]
struct UserAggregate {
    mean: f64,
    std: f64,
    count: usize,
}

pub fn derive(records: &[TransactionRecord], config: &RuleConfig) -> FeatureTable {
    // Group row indices per user, preserving original order within each group.
    let mut by_user: HashMap<&str, Vec<RowIndex>> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        by_user.entry(r.user_id.as_str()).or_default().push(i);
    }

    let aggregates: HashMap<&str, UserAggregate> = by_user
        .iter()
        .map(|(user, rows)| {
            let amounts: Vec<f64> = rows.iter().map(|&i| records[i].amount).collect();
            let agg = UserAggregate {
                mean: stats::mean(&amounts).unwrap_or(0.0),
                std: stats::sample_std(&amounts).unwrap_or(0.0),
                count: rows.len(),
            };
            (*user, agg)
        })
        .collect();

    let mut rows: Vec<DerivedFeatures> = records
        .iter()
        .map(|r| {
            let agg = aggregates
                .get(r.user_id.as_str())
                .copied()
                .unwrap_or_default();
            DerivedFeatures {
                txn_hour: r.timestamp.hour(),
                txn_dow: r.timestamp.weekday().num_days_from_monday(),
                user_mean_amount: agg.mean,
                user_std_amount: agg.std,
                amt_to_avg_ratio: stats::safe_ratio(r.amount, agg.mean),
                amt_z_score: stats::safe_ratio(r.amount - agg.mean, agg.std),
                user_txn_count: agg.count,
                time_since_prev: None,
                velocity_streak: 0,
                small_streak: 0,
                merchant_count: 0,
                merchant_is_rare: false,
            }
        })
        .collect();

    let counts: Vec<f64> = rows.iter().map(|f| f.user_txn_count as f64).collect();
    let txn_count_p98 = stats::quantile(&counts, config.volume_quantile).unwrap_or(0.0);

    for group in by_user.values() {
        let mut ordered = group.clone();
        // Stable: equal timestamps keep their original relative order.
        ordered.sort_by_key(|&i| records[i].timestamp);
        apply_streaks(records, &ordered, &mut rows, config);
    }

    let mut merchant_counts: HashMap<&str, usize> = HashMap::new();
    for r in records {
        *merchant_counts.entry(r.merchant_name.as_str()).or_default() += 1;
    }
    let distinct: Vec<f64> = merchant_counts.values().map(|&c| c as f64).collect();
    let merchant_count_p5 =
        stats::quantile(&distinct, config.rare_merchant_quantile).unwrap_or(0.0);
    for (r, f) in records.iter().zip(rows.iter_mut()) {
        let count = merchant_counts
            .get(r.merchant_name.as_str())
            .copied()
            .unwrap_or(0);
        f.merchant_count = count;
        f.merchant_is_rare = count as f64 <= merchant_count_p5;
    }

    let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
    let amount_p85 = stats::quantile(&amounts, config.deviation_amount_quantile).unwrap_or(0.0);

    let thresholds = BatchThresholds {
        txn_count_p98,
        merchant_count_p5,
        amount_p85,
    };
    log::debug!(
        "features: {} rows, {} users, {} merchants, thresholds={:?}",
        records.len(),
        by_user.len(),
        merchant_counts.len(),
        thresholds
    );

    FeatureTable { rows, thresholds }
}

/// Walk one user's rows in time order and fill the gap and streak columns.
fn apply_streaks(
    records: &[TransactionRecord],
    ordered: &[RowIndex],
    rows: &mut [DerivedFeatures],
    config: &RuleConfig,
) {
    let mut prev: Option<RowIndex> = None;
    let mut velocity = 0u32;
    let mut small = 0u32;

    for &i in ordered {
        let gap = prev.map(|p| {
            (records[i].timestamp - records[p].timestamp).num_milliseconds() as f64 / 1000.0
        });

        velocity = match gap {
            Some(g) if g < config.velocity_gap_secs => velocity + 1,
            _ => 1,
        };
        small = if records[i].amount < config.small_amount_limit {
            small + 1
        } else {
            0
        };

        let f = &mut rows[i];
        f.time_since_prev = gap;
        f.velocity_streak = velocity;
        f.small_streak = small;
        prev = Some(i);
    }
}
