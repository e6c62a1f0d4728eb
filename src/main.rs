#![forbid(unsafe_code)]
//! # Chi-Square Features CLI
//!
//! Command-line interface for the `chi_square_features` crate.
//! Reads categorized reviews from JSON-lines or CSV files and prints the
//! top chi-square terms of every category, followed by the merged vocabulary.
//!
//! ## Features
//! - Single file or whole directory as input.
//! - Optional stopword list and configurable token fields.
//! - Broadcast or term-keyed join.
//! - Optional export of every scored pair (txt, csv, tsv, json).
//!
//! ## Example
//! ```bash
//! cargo run --release -- reviews.json --stopwords stopwords.txt --top-k 75
//! ```
//!
//! See `--help` for all available options.

use chi_square_features::{
    ExportFormat, InputFields, JoinStrategy, PipelineOptions, analyze_path, export_results,
    format_report, print_failed_files, save_report,
};
use clap::Parser;
use log::error;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// File or directory to analyze (.json, .jsonl, .ndjson, .csv)
    path: String,

    /// Optional path to stopword file (.txt, one word per line)
    #[arg(long)]
    stopwords: Option<String>,

    /// Number of terms kept per category
    #[arg(long, default_value_t = chi_square_features::DEFAULT_TOP_K)]
    top_k: usize,

    /// Emissions a local counter buffers before flushing
    #[arg(long, default_value_t = chi_square_features::DEFAULT_FLUSH_THRESHOLD)]
    flush_threshold: usize,

    /// Join in N term-keyed partitions instead of one broadcast partition
    #[arg(long)]
    partitions: Option<usize>,

    /// Shortest token length kept by the tokenizer
    #[arg(long, default_value_t = chi_square_features::DEFAULT_MIN_TOKEN_LEN)]
    min_token_len: usize,

    /// Category field (JSON) or column (CSV)
    #[arg(long, default_value = "category")]
    category_field: String,

    /// Comma-separated JSON text fields that are tokenized
    #[arg(long, value_delimiter = ',', default_value = "reviewText,summary")]
    text_fields: Vec<String>,

    /// CSV column holding the token list
    #[arg(long, default_value = "reviewText_tokens")]
    tokens_column: String,

    /// JSON field holding a pre-tokenized array of terms
    #[arg(long, default_value = "tokens")]
    tokens_field: String,

    /// Output format for the full results export (txt, csv, tsv, json)
    #[arg(long, default_value = "txt")]
    export_format: ExportFormat,

    /// Directory the report (and export) is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Also export every scored (term, category) pair
    #[arg(long, default_value_t = false)]
    full_results: bool,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            flush_threshold: self.flush_threshold,
            top_k: self.top_k,
            strategy: match self.partitions {
                Some(partitions) => JoinStrategy::TermKeyed { partitions },
                None => JoinStrategy::Broadcast,
            },
            min_token_len: self.min_token_len,
            fields: InputFields {
                category: self.category_field.clone(),
                text: self.text_fields.clone(),
                tokens_column: self.tokens_column.clone(),
                tokens_field: self.tokens_field.clone(),
            },
            export_format: self.export_format,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let options = cli.options();

    let report = match analyze_path(
        Path::new(&cli.path),
        cli.stopwords.as_deref().map(Path::new),
        &options,
    ) {
        Ok(report) => report,
        Err(e) => {
            error!("Error: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    print!("{}", format_report(&report.selection));

    let mut any_errors = false;
    if let Err(e) = save_report(&report.selection, &cli.out_dir) {
        error!("Error writing report: {}", e);
        any_errors = true;
    }
    if cli.full_results {
        if let Err(e) = export_results(&report.results, options.export_format, &cli.out_dir) {
            error!("Error exporting results: {}", e);
            any_errors = true;
        }
    }
    if report.ingest.malformed > 0 {
        eprintln!("Skipped {} malformed record(s)", report.ingest.malformed);
    }
    if !report.failed_files.is_empty() {
        print_failed_files(&report.failed_files);
        any_errors = true;
    }
    if any_errors {
        process::exit(1);
    }
}
