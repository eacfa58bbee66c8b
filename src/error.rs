// 🚨 Error taxonomy for the influence-score engine
//
// Ambiguous resolutions are not an error: the resolver's tie-break always
// picks exactly one candidate, so there is no variant for them.

/// Top-level error enum for the engine.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// No filer record matched a roster entry at any tier.
    /// Surfaced to callers as `Resolution::Unresolved`, never as a batch failure.
    #[error("No filer matched roster entry: {0}")]
    ResolutionNotFound(String),

    /// Query, connection or timeout failure on the datastore.
    #[error("Data source unavailable during {operation}: {reason}")]
    DataSourceUnavailable { operation: String, reason: String },

    /// Transaction type code outside the known vocabulary.
    #[error("Invalid transaction code '{code}' on record {sub_id}")]
    InvalidTransactionCode { code: String, sub_id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScoreError {
    /// Wrap a datastore failure for one named operation.
    ///
    /// Interrupted queries (progress-handler deadline) are reported as timeouts.
    pub fn unavailable(operation: &str, err: rusqlite::Error) -> Self {
        let reason = match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                "query timed out".to_string()
            }
            other => other.to_string(),
        };
        ScoreError::DataSourceUnavailable {
            operation: operation.to_string(),
            reason,
        }
    }
}

pub type EngineResult<T> = Result<T, ScoreError>;
