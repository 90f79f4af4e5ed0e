//! Transaction records as ingested at the batch boundary.

use crate::{
    error::{ScanError, ScanResult},
    types::{CategoryCode, RowIndex, TransactionId, UserId},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A row as it arrives from the source table. Every field may be absent;
/// `validate` decides which absences are fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    pub transaction_id: Option<TransactionId>,
    pub user_id: Option<UserId>,
    pub merchant_name: Option<String>,
    pub merchant_category_code: Option<CategoryCode>,
    pub amount: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    pub is_fraud: Option<bool>,
}

impl RawTransaction {
    /// Check the required fields and produce an immutable record.
    /// `row` is only used to locate the offending row in the error.
    pub fn validate(self, row: RowIndex) -> ScanResult<TransactionRecord> {
        let user_id = self
            .user_id
            .ok_or(ScanError::MissingField { field: "user_id", row })?;
        let merchant_name = self
            .merchant_name
            .ok_or(ScanError::MissingField { field: "merchant_name", row })?;
        let amount = self
            .amount
            .filter(|a| a.is_finite())
            .ok_or(ScanError::MissingField { field: "amount", row })?;
        let timestamp = self
            .timestamp
            .ok_or(ScanError::MissingField { field: "timestamp", row })?;

        Ok(TransactionRecord {
            transaction_id: self.transaction_id,
            user_id,
            merchant_name,
            merchant_category_code: self.merchant_category_code,
            amount,
            timestamp,
            is_fraud: self.is_fraud,
        })
    }
}

/// One purchase event. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: Option<TransactionId>,
    pub user_id: UserId,
    pub merchant_name: String,
    pub merchant_category_code: Option<CategoryCode>,
    pub amount: f64,
    pub timestamp: NaiveDateTime,
    /// Ground truth, present only on the labeled subset.
    pub is_fraud: Option<bool>,
}

impl TransactionRecord {
    pub fn new(
        user_id: impl Into<UserId>,
        merchant_name: impl Into<String>,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            transaction_id: None,
            user_id: user_id.into(),
            merchant_name: merchant_name.into(),
            merchant_category_code: None,
            amount,
            timestamp,
            is_fraud: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<TransactionId>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_category(mut self, code: CategoryCode) -> Self {
        self.merchant_category_code = Some(code);
        self
    }

    pub fn with_label(mut self, is_fraud: bool) -> Self {
        self.is_fraud = Some(is_fraud);
        self
    }
}

/// Validate a whole table, failing on the first row with a missing field.
pub fn validate_all(raw: Vec<RawTransaction>) -> ScanResult<Vec<TransactionRecord>> {
    raw.into_iter()
        .enumerate()
        .map(|(row, r)| r.validate(row))
        .collect()
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse the textual timestamp formats seen in transaction exports.
/// A bare date is read as midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
