use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("invalid queue config: {0}")]
    InvalidConfig(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("send queue is missing its {0}")]
    MissingPort(&'static str),

    #[error("send queue must be started inside a tokio runtime")]
    NoRuntime,
}

pub type CourierResult<T> = Result<T, CourierError>;
