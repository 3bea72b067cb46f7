use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OcrDataError>;

#[derive(Debug, Error)]
pub enum OcrDataError {
    /// An annotation line that could not be turned into a sample.
    #[error("{path}:{line}: malformed annotation: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Image bytes that could not be read or decoded. Never fatal to the pipeline.
    #[error("failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// An id outside the vocabulary.
    #[error("id {0} is out of vocabulary range")]
    LookupMiss(i64),

    #[error("tensor error: {0}")]
    Tensor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OcrDataError {
    pub fn config(message: impl Into<String>) -> Self {
        OcrDataError::Config(message.into())
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        OcrDataError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
