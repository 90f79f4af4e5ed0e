//! fraud-scan: batch fraud scoring over a transactions CSV.
//!
//! Usage:
//!   fraud-scan transactions.csv
//!   fraud-scan transactions.csv --mcc mcc_codes.csv --out flagged.csv --seed 7
//!   fraud-scan transactions.csv --config scan.json

use anyhow::{bail, Context, Result};
use fraudscan_core::{
    category::CategoryDictionary,
    config::ScanConfig,
    record::{parse_timestamp, RawTransaction},
    ScanPipeline, ScoredBatch, ScoredTransaction,
};
use std::collections::HashMap;
use std::env;
use std::fs::File;

/// One output line: the input columns followed by every derived column.
#[derive(serde::Serialize)]
struct FlaggedRow<'a> {
    transaction_id: Option<&'a str>,
    user_id: &'a str,
    merchant_name: &'a str,
    merchant_mcc: Option<i64>,
    amount: f64,
    timestamp: String,
    is_fraud: Option<bool>,
    mcc_valid: bool,
    txn_hour: u32,
    txn_dow: u32,
    amt_mean: f64,
    amt_std: f64,
    amt_to_avg_ratio: f64,
    amt_z_score: f64,
    user_txn_count: usize,
    time_since_prev: Option<f64>,
    recent_txn_count: u32,
    small_streak: u32,
    rule_std_dev: bool,
    rule_unusual_activity: bool,
    rule_large: bool,
    rule_velocity: bool,
    rule_time: bool,
    rule_ml_anomaly: bool,
    rule_structuring: bool,
    rule_deviation: bool,
    gmm_score: f64,
    iso_score: f64,
    iso_anomaly: i8,
    fraud_risk_score: f64,
    is_fraud_flagged: bool,
}

impl<'a> From<&'a ScoredTransaction> for FlaggedRow<'a> {
    fn from(s: &'a ScoredTransaction) -> Self {
        let r = &s.record;
        let f = &s.features;
        let v = &s.votes;
        Self {
            transaction_id: r.transaction_id.as_deref(),
            user_id: &r.user_id,
            merchant_name: &r.merchant_name,
            merchant_mcc: r.merchant_category_code,
            amount: r.amount,
            timestamp: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            is_fraud: r.is_fraud,
            mcc_valid: s.mcc_valid,
            txn_hour: f.txn_hour,
            txn_dow: f.txn_dow,
            amt_mean: f.user_mean_amount,
            amt_std: f.user_std_amount,
            amt_to_avg_ratio: f.amt_to_avg_ratio,
            amt_z_score: f.amt_z_score,
            user_txn_count: f.user_txn_count,
            time_since_prev: f.time_since_prev,
            recent_txn_count: f.velocity_streak,
            small_streak: f.small_streak,
            rule_std_dev: v.rule_std_dev,
            rule_unusual_activity: v.rule_unusual_activity,
            rule_large: v.rule_large,
            rule_velocity: v.rule_velocity,
            rule_time: v.rule_time,
            rule_ml_anomaly: v.rule_ml_anomaly,
            rule_structuring: v.rule_structuring,
            rule_deviation: v.rule_deviation,
            gmm_score: s.density_score,
            iso_score: s.isolation_score,
            iso_anomaly: if s.isolation_outlier { -1 } else { 1 },
            fraud_risk_score: s.fraud_risk_score,
            is_fraud_flagged: s.is_fraud_flagged,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(transactions_path) = positional(&args) else {
        bail!("usage: fraud-scan <transactions.csv> [--mcc FILE] [--out FILE] [--config FILE] [--seed N]");
    };
    let mcc_path = flag_value(&args, "--mcc").unwrap_or("mcc_codes.csv");
    let out_path = flag_value(&args, "--out").unwrap_or("flagged_transactions.csv");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if let Some(seed) = flag_value(&args, "--seed") {
        let seed: u64 = seed.parse().with_context(|| format!("--seed {seed} is not a u64"))?;
        config = config.with_seed(seed);
    }

    let raw = read_transactions(transactions_path)
        .with_context(|| format!("reading transactions from {transactions_path}"))?;
    let categories = read_categories(mcc_path)
        .with_context(|| format!("reading category codes from {mcc_path}"))?;

    println!("fraud-scan");
    println!("  transactions: {transactions_path} ({} rows)", raw.len());
    println!("  mcc table:    {mcc_path} ({} codes)", categories.len());
    println!("  seed:         {}", config.seed);
    println!();

    let pipeline = ScanPipeline::new(config, categories)?;
    let batch = pipeline.score_raw(raw)?;

    write_flagged(&batch, out_path).with_context(|| format!("writing {out_path}"))?;
    print_summary(&batch);
    println!();
    println!("Flagged transactions saved to '{out_path}'");
    Ok(())
}

fn read_transactions(path: &str) -> Result<Vec<RawTransaction>> {
    let f = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(f);

    let headers: HashMap<String, usize> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    let column = |names: &[&str]| names.iter().find_map(|n| headers.get(*n).copied());

    let id_col = column(&["transaction_id"]);
    let user_col = column(&["user_id"]);
    let merchant_col = column(&["merchant_name"]);
    let mcc_col = column(&["merchant_mcc", "merchant_category_code", "mcc"]);
    let amount_col = column(&["amount"]);
    let ts_col = column(&["timestamp"]);
    let label_col = column(&["is_fraud"]);

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("row {idx}"))?;
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let timestamp = match field(ts_col) {
            Some(s) => match parse_timestamp(s) {
                Some(ts) => Some(ts),
                None => bail!("row {idx}: unparseable timestamp '{s}'"),
            },
            None => None,
        };
        let amount = match field(amount_col) {
            Some(s) => Some(
                s.parse::<f64>()
                    .with_context(|| format!("row {idx}: amount '{s}'"))?,
            ),
            None => None,
        };

        rows.push(RawTransaction {
            transaction_id: field(id_col).map(String::from),
            user_id: field(user_col).map(String::from),
            merchant_name: field(merchant_col).map(String::from),
            merchant_category_code: field(mcc_col).and_then(parse_code),
            amount,
            timestamp,
            is_fraud: field(label_col).and_then(parse_bool),
        });
    }
    Ok(rows)
}

fn read_categories(path: &str) -> Result<CategoryDictionary> {
    let f = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(f);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_lowercase()).collect();
    let Some(code_col) = headers.iter().position(|h| h == "mcc") else {
        bail!("missing 'mcc' column");
    };
    let Some(desc_col) = headers.iter().position(|h| h == "combined_description") else {
        bail!("missing 'combined_description' column");
    };

    let mut dict = CategoryDictionary::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("row {idx}"))?;
        match record.get(code_col).and_then(|c| parse_code(c.trim())) {
            Some(code) => dict.insert(code, record.get(desc_col).unwrap_or_default()),
            None => log::warn!("category row {idx}: skipping unparseable code {:?}", record.get(code_col)),
        }
    }
    Ok(dict)
}

fn write_flagged(batch: &ScoredBatch, path: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in batch.flagged() {
        wtr.serialize(FlaggedRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_summary(batch: &ScoredBatch) {
    let t = &batch.thresholds;
    println!("=== SCAN SUMMARY ===");
    println!("  rows:             {}", batch.rows.len());
    println!("  flagged:          {}", batch.flagged_count());
    println!("  fraud threshold:  {:.4}", batch.fraud_threshold);
    println!("  txn count p98:    {:.2}", t.txn_count_p98);
    println!("  merchant cnt p5:  {:.2}", t.merchant_count_p5);
    println!("  amount p85:       {:.2}", t.amount_p85);

    println!();
    println!("=== RULE HITS ===");
    for (rule, hits) in batch.rule_hits() {
        println!("  {:<22} {hits}", rule.name());
    }

    if let Some(m) = batch.evaluation() {
        println!();
        println!("=== EVALUATION ({} labeled rows) ===", m.labeled());
        println!("  tp {} | fp {} | tn {} | fn {}", m.true_positive, m.false_positive, m.true_negative, m.false_negative);
        println!(
            "  precision {:.3} | recall {:.3} | f1 {:.3} | accuracy {:.3}",
            m.precision(),
            m.recall(),
            m.f1(),
            m.accuracy()
        );
    }
}

/// Integer code; exports sometimes write codes as floats ("5812.0").
fn parse_code(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(a) = iter.next() {
        if a.starts_with("--") {
            iter.next();
        } else {
            return Some(a);
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
