pub mod anomaly;
pub mod category;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod fusion;
pub mod pipeline;
pub mod record;
pub mod rng;
pub mod rules;
pub mod stats;
pub mod types;

pub use error::{ScanError, ScanResult};
pub use pipeline::{ScanPipeline, ScoredBatch, ScoredTransaction};
