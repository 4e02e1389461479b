use folio_core::CoreError;
use folio_index::IndexError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("encoder error: {0}")]
    Encoder(String),
    #[error("embeddings request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("batch {batch} starting at {ticker}: encoder returned {actual} vectors for {expected} documents")]
    CountMismatch {
        batch: usize,
        ticker: String,
        expected: usize,
        actual: usize,
    },
    #[error("batch {batch}, ticker {ticker}: vector has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        batch: usize,
        ticker: String,
        expected: usize,
        actual: usize,
    },
    #[error("batch {batch} starting at {ticker}: {source}")]
    Batch {
        batch: usize,
        ticker: String,
        #[source]
        source: Box<RagError>,
    },
}

pub type Result<T> = std::result::Result<T, RagError>;
