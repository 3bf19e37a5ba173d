//! Common error types for Duo

use thiserror::Error;

/// Common result type for Duo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Duo crates
#[derive(Error, Debug)]
pub enum Error {
    /// JSON decode/encode error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid participant input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No feedback record covers a (row, column) pair of the sample
    #[error("No feedback record for row {row}, column {column:?}")]
    MissingFeedback { row: String, column: String },

    /// More than one feedback record covers the same (row, column) pair
    #[error("Duplicate feedback records for row {row}, column {column:?}")]
    DuplicateFeedback { row: String, column: String },

    /// Cell address does not resolve to a displayed cell
    #[error("Unknown cell: {0}")]
    UnknownCell(String),

    /// Column is not part of the scenario header
    #[error("Unknown column: {0:?}")]
    UnknownColumn(String),

    /// A backend round-trip is still outstanding
    #[error("A request is already in flight: {0}")]
    RequestInFlight(String),

    /// Input is not accepted in the current session stage
    #[error("Invalid transition: {input} while in {stage}")]
    InvalidTransition { stage: String, input: String },
}
