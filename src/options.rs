use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;

use crate::error::{ChiSquareError, Result};

/// Number of emission-equivalents a local counter buffers before flushing.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 200_000;
/// Number of terms kept per category.
pub const DEFAULT_TOP_K: usize = 75;
/// Shortest token (in chars) the tokenizer keeps.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Output format for the full per-pair results table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Txt,
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }
}

/// How reshaped counts are routed to join partitions.
///
/// `Broadcast` sends every fact to one global partition. It is simple, but the
/// whole join then has to fit into, and run on, a single unit: this is the
/// pipeline's scalability ceiling.
///
/// `TermKeyed` hashes term totals and observations by term into `partitions`
/// buckets and replicates the (small) category totals into each of them, so
/// the join runs per bucket in parallel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinStrategy {
    Broadcast,
    TermKeyed { partitions: usize },
}

/// Field names used when reading records from input files.
#[derive(Clone, Debug)]
pub struct InputFields {
    /// Category field (JSON) or column (CSV).
    pub category: String,
    /// JSON text fields, concatenated and tokenized.
    pub text: Vec<String>,
    /// CSV column holding a token list.
    pub tokens_column: String,
    /// JSON field holding a pre-tokenized array; takes precedence over `text`.
    pub tokens_field: String,
}

impl Default for InputFields {
    fn default() -> Self {
        Self {
            category: "category".to_string(),
            text: vec!["reviewText".to_string(), "summary".to_string()],
            tokens_column: "reviewText_tokens".to_string(),
            tokens_field: "tokens".to_string(),
        }
    }
}

/// Options for a whole pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub flush_threshold: usize,
    pub top_k: usize,
    pub strategy: JoinStrategy,
    pub min_token_len: usize,
    pub fields: InputFields,
    pub export_format: ExportFormat,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            strategy: JoinStrategy::Broadcast,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            fields: InputFields::default(),
            export_format: ExportFormat::Txt,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(ChiSquareError::Configuration(
                "flush threshold must be at least 1".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(ChiSquareError::Configuration(
                "top-k must be at least 1".into(),
            ));
        }
        if let JoinStrategy::TermKeyed { partitions: 0 } = self.strategy {
            return Err(ChiSquareError::Configuration(
                "term-keyed join needs at least one partition".into(),
            ));
        }
        Ok(())
    }
}

/// Shared flag used to abort a running pipeline.
///
/// Clones observe the same flag. Once raised, the pipeline returns
/// [`ChiSquareError::Cancelled`] and emits nothing.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ChiSquareError::Cancelled)
        } else {
            Ok(())
        }
    }
}
