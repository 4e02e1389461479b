use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("csv error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("missing sheet '{sheet}' under {root:?}")]
    MissingSheet { sheet: String, root: PathBuf },
    #[error("sheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },
    #[error("record {ticker} is missing field '{field}'")]
    MissingField { ticker: String, field: String },
    #[error("record {ticker} is missing category '{category}'")]
    MissingCategory { ticker: String, category: String },
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
