//! Wires the stages together: local counting, summation, reshaping, join and selection.
//!
//! Counting runs data-parallel over shards (one [`LocalCounter`] per shard,
//! combined into a per-shard [`CountTable`]) and the shard tables are merged
//! with a parallel reduce. The join is the single serialization point: with
//! [`JoinStrategy::Broadcast`] it runs on one partition, with
//! [`JoinStrategy::TermKeyed`] the partitions run in parallel.
//!
//! Nothing is returned until every partition has finished, so a cancelled or
//! failed run never yields a partial feature set.

use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::counter::{CounterStats, LocalCounter};
use crate::error::{ChiSquareError, Result};
use crate::ingest::{IngestStats, collect_files, read_documents};
use crate::join::join_partition;
use crate::options::{CancelToken, JoinStrategy, PipelineOptions};
use crate::reshape::shuffle;
use crate::select::select_features;
use crate::summation::CountTable;
use crate::tokenize::{Tokenizer, load_stopwords};
use crate::types::{ChiSquareResult, Document, FeatureSelection};

/// Documents handed to one local counter when counting in-memory input.
const SHARD_SIZE: usize = 4_096;

/// Outcome of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub selection: FeatureSelection,
    /// Every non-degenerate pair, unranked.
    pub results: Vec<ChiSquareResult>,
    pub counters: CounterStats,
    pub ingest: IngestStats,
    /// Files that could not be read, with the reason.
    pub failed_files: Vec<(String, String)>,
}

/// Partial counting state of one or more shards.
#[derive(Debug, Default)]
struct Partial {
    table: CountTable,
    counters: CounterStats,
    ingest: IngestStats,
    failed_files: Vec<(String, String)>,
}

impl Partial {
    fn merge(mut self, other: Partial) -> Partial {
        self.table = self.table.merge(other.table);
        self.counters = self.counters.merge(other.counters);
        self.ingest = self.ingest.merge(other.ingest);
        self.failed_files.extend(other.failed_files);
        self
    }
}

fn count_shard(shard: &[Document], threshold: usize, cancel: &CancelToken) -> Result<Partial> {
    let mut table = CountTable::new();
    let mut counter = LocalCounter::new(threshold);
    for doc in shard {
        cancel.check()?;
        counter.observe(doc, &mut table);
    }
    let counters = counter.finish(&mut table);
    Ok(Partial {
        table,
        counters,
        ..Partial::default()
    })
}

/// Counts in-memory documents and sums the shard tables.
pub fn count_documents(
    docs: &[Document],
    threshold: usize,
    cancel: &CancelToken,
) -> Result<(CountTable, CounterStats)> {
    let partial = docs
        .par_chunks(SHARD_SIZE)
        .map(|shard| count_shard(shard, threshold, cancel))
        .try_reduce(Partial::default, |a, b| Ok(a.merge(b)))?;
    Ok((partial.table, partial.counters))
}

/// Reshapes the summed counts, joins every partition and selects the top terms.
pub fn join_and_select(
    table: CountTable,
    options: &PipelineOptions,
    cancel: &CancelToken,
) -> Result<(FeatureSelection, Vec<ChiSquareResult>)> {
    cancel.check()?;
    let partitions = shuffle(table, options.strategy);
    if options.strategy == JoinStrategy::Broadcast {
        info!(
            "joining {} records in a single broadcast partition",
            partitions.iter().map(Vec::len).sum::<usize>()
        );
    } else {
        info!("joining in {} term-keyed partitions", partitions.len());
    }

    let per_partition: Vec<Vec<ChiSquareResult>> = partitions
        .into_par_iter()
        .enumerate()
        .map(|(id, records)| {
            cancel.check()?;
            join_partition(id, records)
        })
        .collect::<Result<_>>()?;
    cancel.check()?;

    let results: Vec<ChiSquareResult> = per_partition.into_iter().flatten().collect();
    let selection = select_features(&results, options.top_k);
    info!(
        "scored {} pairs, selected {} terms over {} categories",
        results.len(),
        selection.vocabulary.len(),
        selection.categories.len()
    );
    Ok((selection, results))
}

pub fn run_documents(docs: &[Document], options: &PipelineOptions) -> Result<PipelineReport> {
    run_documents_with_cancel(docs, options, &CancelToken::new())
}

/// Runs the whole pipeline over in-memory documents.
pub fn run_documents_with_cancel(
    docs: &[Document],
    options: &PipelineOptions,
    cancel: &CancelToken,
) -> Result<PipelineReport> {
    options.validate()?;
    let (table, counters) = count_documents(docs, options.flush_threshold, cancel)?;
    info!(
        "counted {} documents ({} skipped) into {} keys",
        counters.documents,
        counters.skipped,
        table.len()
    );
    let (selection, results) = join_and_select(table, options, cancel)?;
    Ok(PipelineReport {
        selection,
        results,
        counters,
        ..PipelineReport::default()
    })
}

pub fn analyze_path(
    path: &Path,
    stopwords: Option<&Path>,
    options: &PipelineOptions,
) -> Result<PipelineReport> {
    analyze_path_with_cancel(path, stopwords, options, &CancelToken::new())
}

/// Runs the pipeline over every input file below `path`, one local counter per file.
///
/// Files that cannot be opened or lack required columns are reported in
/// `failed_files`; the remaining files are still processed. Cancellation is
/// checked before each file and each record and fails the whole run.
pub fn analyze_path_with_cancel(
    path: &Path,
    stopwords: Option<&Path>,
    options: &PipelineOptions,
    cancel: &CancelToken,
) -> Result<PipelineReport> {
    options.validate()?;
    let files = collect_files(path);
    if files.is_empty() {
        return Err(ChiSquareError::NoInput(path.display().to_string()));
    }
    let stop = match stopwords {
        Some(p) => load_stopwords(p)?,
        None => Default::default(),
    };
    let tokenizer = Tokenizer::new(stop, options.min_token_len);

    let partial = files
        .par_iter()
        .map(|file| {
            cancel.check()?;
            let mut table = CountTable::new();
            let mut counter = LocalCounter::new(options.flush_threshold);
            let read = read_documents(file, &options.fields, &tokenizer, cancel, |doc| {
                counter.observe(&doc, &mut table);
            });
            let counters = counter.finish(&mut table);
            match read {
                Ok(ingest) => Ok(Partial {
                    table,
                    counters,
                    ingest,
                    failed_files: Vec::new(),
                }),
                Err(ChiSquareError::Cancelled) => Err(ChiSquareError::Cancelled),
                Err(e) => {
                    warn!("failed to read {}: {}", file.display(), e);
                    Ok(Partial {
                        failed_files: vec![(file.display().to_string(), e.to_string())],
                        ..Partial::default()
                    })
                }
            }
        })
        .try_reduce(Partial::default, |a, b| Ok(a.merge(b)))?;
    cancel.check()?;

    info!(
        "read {} documents from {} files ({} malformed, {} failed files)",
        partial.ingest.documents,
        files.len(),
        partial.ingest.malformed,
        partial.failed_files.len()
    );
    let (selection, results) = join_and_select(partial.table, options, cancel)?;
    Ok(PipelineReport {
        selection,
        results,
        counters: partial.counters,
        ingest: partial.ingest,
        failed_files: partial.failed_files,
    })
}

/// Prints the files that could not be read to stderr.
pub fn print_failed_files(failed: &[(String, String)]) {
    eprintln!("Failed to read {} file(s):", failed.len());
    for (file, reason) in failed {
        eprintln!("  {file}: {reason}");
    }
}
