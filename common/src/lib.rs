pub mod composite;
pub mod config;
pub mod plot;
pub mod table;
pub mod util;

use thiserror::Error;

/// Columns every results file must carry
pub const REQUIRED_COLUMNS: &[&str] = &["hardware", "task", "runtime", "AUC"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Results file is empty")]
    EmptyInput,
    #[error("Missing column {0} in results header")]
    MissingColumn(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Unknown color {0}")]
    UnknownColor(String),
    #[error("Compositing {output} failed: {reason}")]
    Composite { output: String, reason: String },
}
