//! Error types for the copilot core

use crate::models::Period;
use thiserror::Error;

/// Result type alias for copilot operations
pub type Result<T> = std::result::Result<T, CopilotError>;

#[derive(Error, Debug)]
pub enum CopilotError {
    /// An FX rate was needed but none is recorded at or before the period.
    /// Must reach the orchestrator boundary instead of degrading to zero,
    /// which would corrupt every aggregate built on top of it.
    #[error("no {currency} rate recorded on or before {period}")]
    MissingRate { currency: String, period: Period },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("data error: {0}")]
    Data(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
