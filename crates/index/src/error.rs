use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{vectors} vectors but {tickers} tickers")]
    LengthMismatch { vectors: usize, tickers: usize },
    #[error("index dimension must be positive")]
    ZeroDimension,
    #[error("invalid embeddings file {path:?}: {reason}")]
    InvalidEmbeddings { path: PathBuf, reason: String },
    #[error("index artifacts do not belong together: {0}")]
    ArtifactMismatch(String),
    #[error("index was built with encoder {found}, expected {expected}")]
    EncoderMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;
