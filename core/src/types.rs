//! Shared primitive types used across the scoring pipeline.

/// Opaque identifier of the user (cardholder) a transaction belongs to.
pub type UserId = String;

/// Opaque transaction identifier as it arrived from the source table.
pub type TransactionId = String;

/// Merchant category code.
pub type CategoryCode = i64;

/// Position of a row in the batch as ingested.
pub type RowIndex = usize;
