//! # chi_square_features
//!
//! Chi-square feature selection for categorized text corpora.
//!
//! Documents flow through a small map-reduce style pipeline:
//!
//! 1. [`LocalCounter`]: per shard, counts documents per category and distinct
//!    terms per document into a bounded buffer that is flushed downstream.
//! 2. [`CountTable`]: sums the flushed counts into exact global totals.
//! 3. [`shuffle`] + [`JoinPartition`]: re-keys the totals into tagged records,
//!    routes them to join partitions and scores every (term, category) pair
//!    with the 2x2 chi-square statistic.
//! 4. [`select_features`]: keeps the top terms per category and merges them
//!    into one sorted vocabulary.
//!
//! ## Example
//! ```
//! use chi_square_features::{Document, PipelineOptions, run_documents};
//!
//! let docs = vec![
//!     Document::new("A", ["x", "y"]),
//!     Document::new("A", ["x"]),
//!     Document::new("B", ["y"]),
//!     Document::new("B", ["z"]),
//! ];
//! let report = run_documents(&docs, &PipelineOptions::default()).unwrap();
//! let a = report.selection.category("A").unwrap();
//! assert_eq!(a.features[0].term, "x");
//! assert!((a.features[0].chi_square - 4.0).abs() < 1e-9);
//! ```

mod counter;
mod error;
mod export;
mod ingest;
mod join;
mod options;
mod pipeline;
mod reshape;
mod select;
mod summation;
mod tokenize;
mod types;

pub use counter::{CountSink, CounterStats, LocalCounter};
pub use error::{ChiSquareError, Result};
pub use export::{csv_safe_cell, export_results, format_report, save_report};
pub use ingest::{IngestStats, collect_files, parse_json_record, parse_token_list, read_documents};
pub use join::{Contingency, JoinPartition, JoinState, join_partition};
pub use options::{
    CancelToken, DEFAULT_FLUSH_THRESHOLD, DEFAULT_MIN_TOKEN_LEN, DEFAULT_TOP_K, ExportFormat,
    InputFields, JoinStrategy, PipelineOptions,
};
pub use pipeline::{
    PipelineReport, analyze_path, analyze_path_with_cancel, count_documents, join_and_select,
    print_failed_files, run_documents, run_documents_with_cancel,
};
pub use reshape::{JoinRecord, Route, partition_count, route, shuffle};
pub use select::{rank, select_features};
pub use summation::{AggregatedCounts, CountTable};
pub use tokenize::{DEFAULT_DELIMITERS, Tokenizer, load_stopwords};
pub use types::{CategoryFeatureSet, ChiSquareResult, CountKey, Document, FeatureSelection};
