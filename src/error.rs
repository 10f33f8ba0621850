use chrono::NaiveDate;
use thiserror::Error as ThisError;

/// Reasons an analytic value could not be produced.
///
/// None of these abort a batch run; they are counted against the
/// (entity, date) pair that produced them.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("Insufficient history: need {required} observations, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Industry {industry} has {available} constituents, need {required}")]
    InsufficientConstituents {
        industry: String,
        required: usize,
        available: usize,
    },

    #[error("Non-finite or out of range value for {field}")]
    NonFiniteResult { field: &'static str },

    #[error("No benchmark data for {benchmark} on {date}")]
    MissingBenchmarkData { benchmark: String, date: NaiveDate },
}

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Calculation error: {0}")]
    Calculation(#[from] CalcError),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
