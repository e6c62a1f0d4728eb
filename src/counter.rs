//! In-mapper combining: per-document counting into a bounded local buffer.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::types::{CountKey, Document};

/// Receives `(key, partial sum)` pairs flushed by a [`LocalCounter`].
pub trait CountSink {
    fn emit(&mut self, key: CountKey, count: u64);
}

impl CountSink for Vec<(CountKey, u64)> {
    fn emit(&mut self, key: CountKey, count: u64) {
        self.push((key, count));
    }
}

/// Bookkeeping of one counter instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterStats {
    pub documents: usize,
    pub skipped: usize,
    pub flushes: usize,
}

impl CounterStats {
    pub fn merge(self, other: CounterStats) -> CounterStats {
        CounterStats {
            documents: self.documents + other.documents,
            skipped: self.skipped + other.skipped,
            flushes: self.flushes + other.flushes,
        }
    }
}

/// Counts documents per category and distinct terms per document.
///
/// Each instance owns its buffer. A document accounts for one emission for
/// its category and two per unique term; once `threshold` emissions have
/// accumulated, the buffer is handed to the sink and cleared.
#[derive(Debug)]
pub struct LocalCounter {
    buffer: HashMap<CountKey, u64>,
    pending: usize,
    threshold: usize,
    stats: CounterStats,
}

impl LocalCounter {
    pub fn new(threshold: usize) -> Self {
        Self {
            buffer: HashMap::new(),
            pending: 0,
            threshold: threshold.max(1),
            stats: CounterStats::default(),
        }
    }

    pub fn stats(&self) -> CounterStats {
        self.stats
    }

    /// Number of distinct keys currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn observe<S: CountSink>(&mut self, doc: &Document, sink: &mut S) {
        let category = doc.category.trim();
        if category.is_empty() {
            warn!("skipping document without category");
            self.stats.skipped += 1;
            return;
        }
        self.stats.documents += 1;

        self.add(CountKey::DocCount(category.to_string()));
        self.pending += 1;

        let mut seen: HashSet<String> = HashSet::new();
        for token in &doc.tokens {
            let term = token.trim().to_lowercase();
            if term.is_empty() || !seen.insert(term.clone()) {
                continue;
            }
            self.add(CountKey::TermCategory {
                term: term.clone(),
                category: category.to_string(),
            });
            self.add(CountKey::TermTotal(term));
            self.pending += 2;
        }

        if self.pending >= self.threshold {
            self.flush(sink);
        }
    }

    /// Hands every buffered `(key, sum)` to the sink and clears the buffer.
    pub fn flush<S: CountSink>(&mut self, sink: &mut S) {
        if self.buffer.is_empty() {
            return;
        }
        debug!(
            "flushing {} keys ({} emissions)",
            self.buffer.len(),
            self.pending
        );
        for (key, count) in self.buffer.drain() {
            sink.emit(key, count);
        }
        self.pending = 0;
        self.stats.flushes += 1;
    }

    /// Final flush once the input of this instance is exhausted.
    pub fn finish<S: CountSink>(mut self, sink: &mut S) -> CounterStats {
        self.flush(sink);
        self.stats
    }

    fn add(&mut self, key: CountKey) {
        *self.buffer.entry(key).or_insert(0) += 1;
    }
}
