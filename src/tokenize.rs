use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Characters treated as token boundaries in addition to whitespace and ASCII digits.
pub const DEFAULT_DELIMITERS: &str = "()[]{}.!?,;:+=-_\"'`~#@&*%€$§<>^\\/";

/// Splits text into lower-cased tokens.
///
/// The text is split at whitespace, ASCII digits and every delimiter char.
/// Tokens shorter than `min_len` chars and stop words are dropped; order is kept.
///
/// # Example
/// ```
/// use std::collections::HashSet;
/// use chi_square_features::Tokenizer;
///
/// let mut stop = HashSet::new();
/// stop.insert("the".to_string());
/// let tokenizer = Tokenizer::new(stop, 2);
/// let tokens = tokenizer.tokenize("The (quick) fox, 42 times: a FOX!");
/// assert_eq!(tokens, vec!["quick", "fox", "times", "fox"]);
/// ```
#[derive(Clone, Debug)]
pub struct Tokenizer {
    delimiters: HashSet<char>,
    stopwords: HashSet<String>,
    min_len: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(HashSet::new(), crate::options::DEFAULT_MIN_TOKEN_LEN)
    }
}

impl Tokenizer {
    pub fn new(stopwords: HashSet<String>, min_len: usize) -> Self {
        Self::with_delimiters(DEFAULT_DELIMITERS, stopwords, min_len)
    }

    pub fn with_delimiters(delimiters: &str, stopwords: HashSet<String>, min_len: usize) -> Self {
        Self {
            delimiters: delimiters.chars().collect(),
            stopwords,
            min_len,
        }
    }

    fn is_boundary(&self, c: char) -> bool {
        c.is_whitespace() || c.is_ascii_digit() || self.delimiters.contains(&c)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| self.is_boundary(c))
            .filter(|t| t.chars().count() >= self.min_len)
            .filter(|t| !self.stopwords.contains(*t))
            .map(String::from)
            .collect()
    }
}

/// Loads a stop word list, one word per line. Blank lines are ignored.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect())
}
