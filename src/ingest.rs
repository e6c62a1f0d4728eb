//! Reading categorized records from JSON-lines and CSV files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::warn;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{ChiSquareError, Result};
use crate::options::{CancelToken, InputFields};
use crate::tokenize::Tokenizer;
use crate::types::Document;

const INPUT_EXTENSIONS: [&str; 4] = ["json", "jsonl", "ndjson", "csv"];

/// Counts of records read from one or more files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub malformed: usize,
}

impl IngestStats {
    pub fn merge(self, other: IngestStats) -> IngestStats {
        IngestStats {
            documents: self.documents + other.documents,
            malformed: self.malformed + other.malformed,
        }
    }
}

/// Collects input files: `path` itself, or every supported file below it, sorted.
pub fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported(p))
        .collect();
    files.sort();
    files
}

fn is_supported(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_csv(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Streams the documents of one file into `sink`.
///
/// Unusable records are skipped and counted as malformed; only failures to
/// open or read the file itself are returned as errors. `cancel` is checked
/// before every record, so a cancelled run stops mid-file with
/// [`ChiSquareError::Cancelled`].
pub fn read_documents<F>(
    path: &Path,
    fields: &InputFields,
    tokenizer: &Tokenizer,
    cancel: &CancelToken,
    sink: F,
) -> Result<IngestStats>
where
    F: FnMut(Document),
{
    cancel.check()?;
    if is_csv(path) {
        read_csv(path, fields, cancel, sink)
    } else {
        read_json_lines(path, fields, tokenizer, cancel, sink)
    }
}

fn read_json_lines<F>(
    path: &Path,
    fields: &InputFields,
    tokenizer: &Tokenizer,
    cancel: &CancelToken,
    mut sink: F,
) -> Result<IngestStats>
where
    F: FnMut(Document),
{
    let mut reader = BufReader::new(File::open(path)?);
    let mut stats = IngestStats::default();
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        cancel.check()?;
        let parsed = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_json_record(line, fields, tokenizer),
            Err(_) => None,
        };
        match parsed {
            Some(doc) => {
                stats.documents += 1;
                sink(doc);
            }
            None => {
                warn!("{}:{}: skipping malformed record", path.display(), line_no);
                stats.malformed += 1;
            }
        }
    }
    Ok(stats)
}

/// Parses one JSON object into a document.
///
/// An array under the configured tokens field is used as-is; otherwise the
/// configured text fields are joined with a space and tokenized.
pub fn parse_json_record(
    line: &str,
    fields: &InputFields,
    tokenizer: &Tokenizer,
) -> Option<Document> {
    let value: Value = serde_json::from_str(line).ok()?;
    let obj = value.as_object()?;
    let category = obj.get(&fields.category)?.as_str()?.trim();
    if category.is_empty() {
        return None;
    }

    let tokens = match obj.get(&fields.tokens_field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| t.as_str().map(String::from))
            .collect::<Option<Vec<String>>>()?,
        Some(_) => return None,
        None => {
            let text = fields
                .text
                .iter()
                .filter_map(|f| obj.get(f).and_then(Value::as_str))
                .collect::<Vec<&str>>()
                .join(" ");
            tokenizer.tokenize(&text)
        }
    };
    Some(Document::new(category, tokens))
}

fn read_csv<F>(
    path: &Path,
    fields: &InputFields,
    cancel: &CancelToken,
    mut sink: F,
) -> Result<IngestStats>
where
    F: FnMut(Document),
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            ChiSquareError::Configuration(format!(
                "{}: missing column '{}'",
                path.display(),
                name
            ))
        })
    };
    let category_idx = column(fields.category.as_str())?;
    let tokens_idx = column(fields.tokens_column.as_str())?;

    let mut stats = IngestStats::default();
    for (index, record) in reader.records().enumerate() {
        cancel.check()?;
        let parsed = match record {
            Ok(r) if r.len() == headers.len() => {
                let category = r.get(category_idx).unwrap_or("").trim();
                match parse_token_list(r.get(tokens_idx).unwrap_or("")) {
                    Some(tokens) if !category.is_empty() => Some(Document::new(category, tokens)),
                    _ => None,
                }
            }
            Ok(_) => None,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => None,
        };
        match parsed {
            Some(doc) => {
                stats.documents += 1;
                sink(doc);
            }
            None => {
                warn!("{}: row {}: skipping malformed record", path.display(), index + 2);
                stats.malformed += 1;
            }
        }
    }
    Ok(stats)
}

/// Parses a token cell: a bracketed list of quoted strings, or plain
/// whitespace-separated tokens.
///
/// # Example
/// ```
/// use chi_square_features::parse_token_list;
///
/// assert_eq!(parse_token_list("['good', \"fit\"]"), Some(vec!["good".to_string(), "fit".to_string()]));
/// assert_eq!(parse_token_list("good fit"), Some(vec!["good".to_string(), "fit".to_string()]));
/// assert_eq!(parse_token_list("['unterminated"), None);
/// ```
pub fn parse_token_list(cell: &str) -> Option<Vec<String>> {
    let cell = cell.trim();
    let Some(inner) = cell.strip_prefix('[') else {
        return Some(cell.split_whitespace().map(String::from).collect());
    };
    let inner = inner.strip_suffix(']')?;

    let mut tokens = Vec::new();
    let mut chars = inner.chars();
    loop {
        let quote = match chars.find(|c| !c.is_whitespace() && *c != ',') {
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
            None => break,
        };
        let mut token = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => token.push(chars.next()?),
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => token.push(c),
            }
        }
        if !closed {
            return None;
        }
        tokens.push(token);
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fields() -> InputFields {
        InputFields::default()
    }

    fn read_all(p: &Path) -> (Result<IngestStats>, Vec<Document>) {
        let mut docs = Vec::new();
        let stats = read_documents(p, &fields(), &Tokenizer::default(), &CancelToken::new(), |d| {
            docs.push(d)
        });
        (stats, docs)
    }

    #[test]
    fn json_record_uses_text_fields() {
        let doc = parse_json_record(
            r#"{"category": "Books", "reviewText": "Gripping plot", "summary": "Loved it"}"#,
            &fields(),
            &Tokenizer::default(),
        )
        .unwrap();
        assert_eq!(doc.category, "Books");
        assert_eq!(doc.tokens, vec!["gripping", "plot", "loved", "it"]);
    }

    #[test]
    fn json_record_prefers_token_array() {
        let doc = parse_json_record(
            r#"{"category": "Toys", "tokens": ["lego", "bricks"], "reviewText": "ignored"}"#,
            &fields(),
            &Tokenizer::default(),
        )
        .unwrap();
        assert_eq!(doc.tokens, vec!["lego", "bricks"]);
    }

    #[test]
    fn json_record_uses_configured_tokens_field() {
        let custom = InputFields {
            tokens_field: "reviewText_tokens".to_string(),
            ..fields()
        };
        let line = r#"{"category": "Toys", "reviewText_tokens": ["lego"], "tokens": ["other"]}"#;
        let doc = parse_json_record(line, &custom, &Tokenizer::default()).unwrap();
        assert_eq!(doc.tokens, vec!["lego"]);

        // the default field name is not consulted once another is configured
        let doc = parse_json_record(
            r#"{"category": "Toys", "tokens": ["other"], "reviewText": "Wooden train"}"#,
            &custom,
            &Tokenizer::default(),
        )
        .unwrap();
        assert_eq!(doc.tokens, vec!["wooden", "train"]);
    }

    #[test]
    fn json_record_rejects_missing_category() {
        let t = Tokenizer::default();
        assert!(parse_json_record(r#"{"reviewText": "x"}"#, &fields(), &t).is_none());
        assert!(parse_json_record(r#"{"category": "", "reviewText": "x"}"#, &fields(), &t).is_none());
        assert!(parse_json_record(r#"{"category": 3}"#, &fields(), &t).is_none());
        assert!(parse_json_record("not json", &fields(), &t).is_none());
        assert!(parse_json_record(r#"{"category": "a", "tokens": [1]}"#, &fields(), &t).is_none());
    }

    #[test]
    fn reads_json_lines_and_counts_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reviews.json");
        fs::write(
            &p,
            "{\"category\": \"a\", \"reviewText\": \"one two\"}\n\n{broken\n{\"category\": \"b\"}\n",
        )
        .unwrap();
        let (stats, docs) = read_all(&p);
        let stats = stats.unwrap();
        assert_eq!(stats, IngestStats { documents: 2, malformed: 1 });
        assert_eq!(docs[1], Document::new("b", Vec::<String>::new()));
    }

    #[test]
    fn invalid_utf8_line_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reviews.json");
        let good = b"{\"category\": \"a\", \"reviewText\": \"fine words\"}\n";
        let mut bytes = Vec::new();
        for _ in 0..3 {
            bytes.extend_from_slice(good);
        }
        bytes.extend_from_slice(b"{\"category\": \"a\", \"reviewText\": \"caf\xff\xfe\"}\n");
        for _ in 0..3 {
            bytes.extend_from_slice(good);
        }
        fs::write(&p, bytes).unwrap();

        let (stats, docs) = read_all(&p);
        assert_eq!(stats.unwrap(), IngestStats { documents: 6, malformed: 1 });
        assert_eq!(docs.len(), 6);
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reviews.jsonl");
        let body = "{\"category\": \"a\", \"tokens\": [\"x\"]}\r\n\r\n{\"category\": \"b\", \"tokens\": []}";
        fs::write(&p, body).unwrap();
        let (stats, docs) = read_all(&p);
        assert_eq!(stats.unwrap(), IngestStats { documents: 2, malformed: 0 });
        assert_eq!(docs[0], Document::new("a", ["x"]));
    }

    #[test]
    fn cancelling_stops_reading_between_records() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("reviews.json");
        let csv = dir.path().join("chi_input.csv");
        fs::write(&json, "{\"category\": \"a\", \"tokens\": [\"x\"]}\n".repeat(5)).unwrap();
        fs::write(&csv, format!("category,reviewText_tokens\n{}", "a,['x']\n".repeat(5))).unwrap();

        for p in [&json, &csv] {
            let cancel = CancelToken::new();
            let mut seen = 0;
            let res = read_documents(p, &fields(), &Tokenizer::default(), &cancel, |_| {
                seen += 1;
                cancel.cancel();
            });
            assert!(matches!(res, Err(ChiSquareError::Cancelled)));
            assert_eq!(seen, 1, "{}", p.display());
        }

        let cancelled = CancelToken::new();
        cancelled.cancel();
        let mut seen = 0;
        let res = read_documents(&json, &fields(), &Tokenizer::default(), &cancelled, |_| {
            seen += 1
        });
        assert!(matches!(res, Err(ChiSquareError::Cancelled)));
        assert_eq!(seen, 0);
    }

    #[test]
    fn reads_csv_with_list_cells() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("chi_input.csv");
        fs::write(
            &p,
            "reviewText_tokens,category\n\"['great', 'fit']\",Clothing\n\"['bad'\",Clothing\n\"['ok']\",\nonly_one_column\n",
        )
        .unwrap();
        let (stats, docs) = read_all(&p);
        let stats = stats.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.malformed, 3);
        assert_eq!(docs[0], Document::new("Clothing", ["great", "fit"]));
    }

    #[test]
    fn csv_without_required_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.csv");
        fs::write(&p, "text,label\nfoo,bar\n").unwrap();
        let err = read_all(&p).0.unwrap_err();
        assert!(matches!(err, ChiSquareError::Configuration(_)));
    }

    #[test]
    fn token_list_variants() {
        assert_eq!(parse_token_list("[]"), Some(vec![]));
        assert_eq!(
            parse_token_list(r#"["it\'s", 'b']"#),
            Some(vec!["it's".to_string(), "b".to_string()])
        );
        assert_eq!(parse_token_list("[a, b]"), None);
        assert_eq!(parse_token_list("['a'"), None);
    }

    #[test]
    fn collects_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.jsonl"), "").unwrap();
        fs::write(dir.path().join("sub/a.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = collect_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.jsonl"));
        assert!(files[1].ends_with("sub/a.csv"));
    }
}
