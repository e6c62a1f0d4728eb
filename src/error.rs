use std::io;

use thiserror::Error;

/// Errors surfaced by the counting, join and export stages.
#[derive(Debug, Error)]
pub enum ChiSquareError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A contingency cell came out negative, which only happens when some
    /// upstream count was emitted twice.
    #[error(
        "integrity violation for term '{term}' in category '{category}': A={a}, B={b}, C={c}, D={d}"
    )]
    Integrity {
        term: String,
        category: String,
        a: i64,
        b: i64,
        c: i64,
        d: i64,
    },
    #[error("join partition {0} has already been finished")]
    PartitionFinished(usize),
    #[error("pipeline cancelled before results were complete")]
    Cancelled,
    #[error("no input files found under '{0}'")]
    NoInput(String),
}

pub type Result<T> = std::result::Result<T, ChiSquareError>;
