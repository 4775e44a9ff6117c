//! Error types for Lapscope

use thiserror::Error;

/// Errors that can occur while analysing a race session
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unparsable duration for {field}: {value:?}")]
    MalformedDuration { field: &'static str, value: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Lap {lap_number} not found for driver {driver_id}")]
    LapNotFound { driver_id: String, lap_number: u32 },

    #[error("Insufficient data: need at least {required} rows with a known lap time, found {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`AnalysisError`].
///
/// A presentation layer renders a failure state for every kind; an empty
/// result is never an error and has no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    NotFound,
    InsufficientData,
    ModelFit,
    Config,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MalformedDuration { .. }
            | AnalysisError::MalformedInput(_)
            | AnalysisError::JsonError(_)
            | AnalysisError::MissingField(_) => ErrorKind::MalformedInput,
            AnalysisError::DriverNotFound(_) | AnalysisError::LapNotFound { .. } => {
                ErrorKind::NotFound
            }
            AnalysisError::InsufficientData { .. } => ErrorKind::InsufficientData,
            AnalysisError::ModelFit(_) => ErrorKind::ModelFit,
            AnalysisError::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}
