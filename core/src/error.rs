use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Missing required field '{field}' at row {row}")]
    MissingField { field: &'static str, row: usize },

    #[error("Insufficient data for {estimator}: {rows} rows, need at least {required}")]
    DataInsufficient {
        estimator: &'static str,
        rows: usize,
        required: usize,
    },

    #[error("Calibration unavailable: batch has no rows labeled as fraud")]
    CalibrationUnavailable,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Numerical failure in {estimator}: {detail}")]
    Numerical {
        estimator: &'static str,
        detail: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScanResult<T> = Result<T, ScanError>;
