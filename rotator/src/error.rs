use rotator_execution::error::ClientError;
use thiserror::Error;

/// Top-level application errors: a phase that returns one of these reports a
/// non-zero exit code bit, without blocking subsequent phases.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("venue client: {0}")]
    Client(#[from] ClientError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Lock(String),

    #[error("position state: {0}")]
    State(String),
}
