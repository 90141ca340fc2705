use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrontierError>;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The data provider answered, but not with usable data.
    #[error("provider error for {ticker}: {message}")]
    Provider { ticker: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("result table is empty")]
    EmptyResults,
}
