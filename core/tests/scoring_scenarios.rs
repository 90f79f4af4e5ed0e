//! End-to-end scans over small hand-built batches.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use fraudscan_core::{
    category::CategoryDictionary,
    config::ScanConfig,
    record::{parse_timestamp, RawTransaction, TransactionRecord},
    rules::RuleId,
    ScanError, ScanPipeline,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ts(s: &str) -> NaiveDateTime {
    parse_timestamp(s).expect("test timestamp")
}

fn categories() -> CategoryDictionary {
    [
        (5812, "Eating Places Restaurants Cafe"),
        (5732, "Electronics Stores"),
    ]
    .into_iter()
    .collect()
}

fn pipeline() -> ScanPipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    ScanPipeline::new(ScanConfig::default(), categories()).expect("valid config")
}

/// Nine $10–18 purchases an hour apart, then $500 at 2 AM the next day.
fn night_spike_batch() -> Vec<TransactionRecord> {
    let start = ts("2024-03-04 09:00:00");
    let mut rows: Vec<TransactionRecord> = (0..9)
        .map(|i| {
            TransactionRecord::new("alice", "Corner Cafe", 10.0 + i as f64, start + Duration::hours(i))
                .with_id(format!("a-{i}"))
                .with_category(5812)
                .with_label(false)
        })
        .collect();
    rows.push(
        TransactionRecord::new("alice", "Electronics Hub", 500.0, ts("2024-03-05 02:00:00"))
            .with_id("a-9")
            .with_category(5732)
            .with_label(true),
    );
    rows
}

/// Six purchases 45 seconds apart, then one ten minutes later.
fn burst_batch() -> Vec<TransactionRecord> {
    let start = ts("2024-03-04 10:00:00");
    let mut rows: Vec<TransactionRecord> = (0..6)
        .map(|i| {
            TransactionRecord::new("bob", "Gift Cards R Us", 25.0 + i as f64, start + Duration::seconds(45 * i))
                .with_id(format!("b-{i}"))
                .with_label(i == 5)
        })
        .collect();
    rows.push(
        TransactionRecord::new("bob", "Gift Cards R Us", 30.0, start + Duration::seconds(225 + 600))
            .with_id("b-6")
            .with_label(false),
    );
    rows
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn night_spike_is_flagged() {
    let batch = pipeline().score(night_spike_batch()).expect("scan");
    let spike = &batch.rows[9];

    assert!(spike.votes.rule_time, "2 AM must vote rule_time");
    assert!(
        spike.votes.rule_std_dev || spike.votes.rule_large,
        "$500 against a $10–18 history must vote std-dev or large: z={}",
        spike.features.amt_z_score
    );
    assert!(spike.votes.rule_deviation, "one-off merchant above p85 must vote deviation");
    assert!(spike.is_fraud_flagged, "night spike must be flagged");

    let flagged = batch.flagged();
    assert!(flagged.iter().any(|r| r.record.transaction_id.as_deref() == Some("a-9")));
}

#[test]
fn burst_votes_velocity_from_fifth_transaction() {
    let batch = pipeline().score(burst_batch()).expect("scan");

    let velocity: Vec<bool> = batch.rows.iter().map(|r| r.votes.rule_velocity).collect();
    assert_eq!(velocity, vec![false, false, false, false, true, true, false]);

    let streaks: Vec<u32> = batch.rows.iter().map(|r| r.features.velocity_streak).collect();
    assert_eq!(streaks, vec![1, 2, 3, 4, 5, 6, 1], "gap > 300s must reset the streak");
    assert_eq!(batch.rows[6].features.time_since_prev, Some(600.0));
}

#[test]
fn unlabeled_batch_cannot_be_calibrated() {
    let rows: Vec<TransactionRecord> = night_spike_batch()
        .into_iter()
        .map(|mut r| {
            r.is_fraud = None;
            r
        })
        .collect();
    let result = pipeline().score(rows);
    assert!(
        matches!(result, Err(ScanError::CalibrationUnavailable)),
        "expected CalibrationUnavailable, got {result:?}"
    );
}

#[test]
fn all_negative_labels_cannot_be_calibrated() {
    let rows: Vec<TransactionRecord> = night_spike_batch()
        .into_iter()
        .map(|r| r.with_label(false))
        .collect();
    assert!(matches!(pipeline().score(rows), Err(ScanError::CalibrationUnavailable)));
}

#[test]
fn batch_smaller_than_mixture_is_data_insufficient() {
    let rows: Vec<TransactionRecord> = night_spike_batch().into_iter().skip(7).collect();
    assert_eq!(rows.len(), 3);
    match pipeline().score(rows) {
        Err(ScanError::DataInsufficient { estimator, rows, required }) => {
            assert_eq!(estimator, "density");
            assert_eq!(rows, 3);
            assert_eq!(required, 4);
        }
        other => panic!("expected DataInsufficient, got {other:?}"),
    }
}

#[test]
fn missing_timestamp_aborts_the_run() {
    let raw = vec![
        RawTransaction {
            user_id: Some("u".into()),
            merchant_name: Some("m".into()),
            amount: Some(12.0),
            timestamp: Some(ts("2024-03-04 10:00:00")),
            ..Default::default()
        },
        RawTransaction {
            user_id: Some("u".into()),
            merchant_name: Some("m".into()),
            amount: Some(12.0),
            ..Default::default()
        },
    ];
    match pipeline().score_raw(raw) {
        Err(ScanError::MissingField { field, row }) => {
            assert_eq!(field, "timestamp");
            assert_eq!(row, 1);
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn mcc_valid_only_for_known_matching_codes() {
    let mut rows = night_spike_batch();
    rows[0].merchant_category_code = None;
    rows[1].merchant_category_code = Some(1111);
    let batch = pipeline().score(rows).expect("scan");

    assert!(!batch.rows[0].mcc_valid, "absent code is invalid");
    assert!(!batch.rows[1].mcc_valid, "unknown code is invalid");
    assert!(batch.rows[2].mcc_valid, "'cafe' appears in 'Corner Cafe'");
    assert!(batch.rows[9].mcc_valid, "'electronics' appears in 'Electronics Hub'");
}

#[test]
fn single_transaction_user_never_votes_std_dev() {
    let mut rows = night_spike_batch();
    rows.push(
        TransactionRecord::new("carol", "Jewelry Palace", 9_000.0, ts("2024-03-04 13:30:00"))
            .with_id("c-0"),
    );
    let batch = pipeline().score(rows).expect("scan");
    let carol = &batch.rows[10];

    assert_eq!(carol.features.user_txn_count, 1);
    assert_eq!(carol.features.amt_z_score, 0.0);
    assert_eq!(carol.features.user_std_amount, 0.0);
    assert!(!carol.votes.rule_std_dev);
    assert!(!carol.votes.rule_large);
}

#[test]
fn flagged_subset_keeps_input_order() {
    let mut rows = burst_batch();
    rows.extend(night_spike_batch());
    let batch = pipeline().score(rows).expect("scan");

    let positions: Vec<usize> = batch
        .flagged()
        .iter()
        .map(|f| {
            batch
                .rows
                .iter()
                .position(|r| r.record.transaction_id == f.record.transaction_id)
                .expect("flagged row comes from the batch")
        })
        .collect();
    assert!(!positions.is_empty(), "the night spike at least is flagged");
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "order was {positions:?}");
    assert_eq!(batch.flagged_count(), positions.len());
}

#[test]
fn rule_hits_and_evaluation_summarise_the_batch() {
    let batch = pipeline().score(night_spike_batch()).expect("scan");

    let hits = batch.rule_hits();
    assert_eq!(hits.len(), RuleId::ALL.len());
    let time_hits = hits
        .iter()
        .find(|(rule, _)| *rule == RuleId::Time)
        .map(|(_, n)| *n);
    assert_eq!(time_hits, Some(1));

    let eval = batch.evaluation().expect("batch is labeled");
    assert_eq!(eval.labeled(), 10);
    assert_eq!(eval.true_positive, 1, "the labeled spike is flagged");
    assert_eq!(eval.false_negative, 0);
}

#[test]
fn invalid_config_is_rejected_before_scoring() {
    let mut config = ScanConfig::default();
    config.isolation.n_trees = 0;
    assert!(matches!(
        ScanPipeline::new(config, CategoryDictionary::new()),
        Err(ScanError::InvalidConfig(_))
    ));
}

#[test]
fn raising_the_spike_keeps_rule_large() {
    let mut previous = false;
    for amount in [500.0, 750.0, 1_000.0, 5_000.0, 100_000.0] {
        let mut rows = night_spike_batch();
        rows[9].amount = amount;
        let batch = pipeline().score(rows).expect("scan");
        let large = batch.rows[9].votes.rule_large;
        assert!(large || !previous, "rule_large dropped at amount {amount}");
        previous = large;
    }
    assert!(previous);
}
