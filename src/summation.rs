use std::collections::{BTreeMap, HashMap};

use crate::counter::CountSink;
use crate::types::CountKey;

/// Exact sums of flushed counts, keyed by [`CountKey`].
///
/// Sums are associative and commutative, so a table may act as a combiner
/// for one shard and later be merged with other tables in any order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountTable {
    sums: HashMap<CountKey, u64>,
}

impl CountSink for CountTable {
    fn emit(&mut self, key: CountKey, count: u64) {
        *self.sums.entry(key).or_insert(0) += count;
    }
}

impl FromIterator<(CountKey, u64)> for CountTable {
    fn from_iter<I: IntoIterator<Item = (CountKey, u64)>>(iter: I) -> Self {
        let mut table = CountTable::default();
        for (key, count) in iter {
            table.emit(key, count);
        }
        table
    }
}

impl IntoIterator for CountTable {
    type Item = (CountKey, u64);
    type IntoIter = std::collections::hash_map::IntoIter<CountKey, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.sums.into_iter()
    }
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn get(&self, key: &CountKey) -> u64 {
        self.sums.get(key).copied().unwrap_or(0)
    }

    /// Folds `other` into `self`, keeping the larger map as the base.
    pub fn merge(mut self, mut other: CountTable) -> CountTable {
        if self.sums.len() < other.sums.len() {
            std::mem::swap(&mut self, &mut other);
        }
        for (key, count) in other.sums {
            self.emit(key, count);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CountKey, u64)> + '_ {
        self.sums.iter().map(|(k, v)| (k, *v))
    }

    pub fn into_counts(self) -> AggregatedCounts {
        let mut out = AggregatedCounts::default();
        for (key, count) in self.sums {
            match key {
                CountKey::DocCount(category) => {
                    out.category_totals.insert(category, count);
                }
                CountKey::TermTotal(term) => {
                    out.term_totals.insert(term, count);
                }
                CountKey::TermCategory { term, category } => {
                    out.term_category.insert((term, category), count);
                }
            }
        }
        out
    }
}

/// The three global tables produced by summation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedCounts {
    /// Documents per category.
    pub category_totals: BTreeMap<String, u64>,
    /// Documents per term.
    pub term_totals: BTreeMap<String, u64>,
    /// Documents per (term, category).
    pub term_category: BTreeMap<(String, String), u64>,
}

impl AggregatedCounts {
    pub fn total_documents(&self) -> u64 {
        self.category_totals.values().sum()
    }
}
