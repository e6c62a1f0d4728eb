use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::prelude::*;

use crate::error::Result;
use crate::options::ExportFormat;
use crate::types::{ChiSquareResult, FeatureSelection};

const RESULT_COLUMNS: [&str; 7] = [
    "term",
    "category",
    "chi_square",
    "observed",
    "expected",
    "total_term",
    "total_category",
];

/// Renders the feature report: one line per category, then the merged vocabulary.
///
/// # Example
/// ```
/// use chi_square_features::{Document, PipelineOptions, format_report, run_documents};
///
/// let docs = vec![
///     Document::new("A", ["x", "y"]),
///     Document::new("A", ["x"]),
///     Document::new("B", ["y"]),
///     Document::new("B", ["z"]),
/// ];
/// let report = run_documents(&docs, &PipelineOptions::default()).unwrap();
/// let text = format_report(&report.selection);
/// let lines: Vec<&str> = text.lines().collect();
/// assert_eq!(lines[0], "A x:4.000 y:0.000");
/// assert_eq!(lines[1], "B z:1.333 y:0.000");
/// assert_eq!(lines[2], "x y z");
/// ```
pub fn format_report(selection: &FeatureSelection) -> String {
    let mut out = String::new();
    for set in &selection.categories {
        if set.features.is_empty() {
            continue;
        }
        out.push_str(&set.category);
        for f in &set.features {
            out.push_str(&format!(" {}:{:.3}", f.term, f.chi_square));
        }
        out.push('\n');
    }
    out.push_str(&selection.vocabulary.join(" "));
    out.push('\n');
    out
}

fn timestamped(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let local: DateTime<Local> = Local::now();
    let name = format!("{}_{}.{}", local.format("%Y_%m_%d_%H_%M_%S"), stem, ext);
    dir.join(name)
}

/// Writes the report into `dir` under a timestamped name and returns its path.
pub fn save_report(selection: &FeatureSelection, dir: &Path) -> Result<PathBuf> {
    let path = timestamped(dir, "chi_square_features", "txt");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    file.write_all(format_report(selection).as_bytes())?;
    Ok(path)
}

/// Prefixes cells that a spreadsheet would evaluate as a formula.
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell,
    }
}

/// Exports every scored pair, sorted by category then rank.
pub fn export_results(
    results: &[ChiSquareResult],
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf> {
    let mut sorted: Vec<&ChiSquareResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| crate::select::rank(a, b))
    });

    let path = timestamped(dir, "chi_square_results", format.extension());
    match format {
        ExportFormat::Json => {
            let file = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(file, &sorted)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv | ExportFormat::Txt => {
            let delimiter = if format == ExportFormat::Csv { b',' } else { b'\t' };
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_path(&path)?;
            wtr.write_record(RESULT_COLUMNS)?;
            for r in sorted {
                wtr.write_record([
                    csv_safe_cell(r.term.clone()),
                    csv_safe_cell(r.category.clone()),
                    r.chi_square.to_string(),
                    r.observed.to_string(),
                    r.expected.to_string(),
                    r.total_term.to_string(),
                    r.total_category.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
    }
    Ok(path)
}
