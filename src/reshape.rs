//! Re-keys aggregated counts into tagged join records and routes them to join partitions.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::options::JoinStrategy;
use crate::summation::CountTable;
use crate::types::CountKey;

/// An aggregated count, tagged with the table it belongs to in the join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinRecord {
    CategoryTotal { category: String, count: u64 },
    TermTotal { term: String, count: u64 },
    Observation { term: String, category: String, count: u64 },
}

impl From<(CountKey, u64)> for JoinRecord {
    fn from((key, count): (CountKey, u64)) -> Self {
        match key {
            CountKey::DocCount(category) => JoinRecord::CategoryTotal { category, count },
            CountKey::TermTotal(term) => JoinRecord::TermTotal { term, count },
            CountKey::TermCategory { term, category } => JoinRecord::Observation {
                term,
                category,
                count,
            },
        }
    }
}

/// Where a record has to go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Partition(usize),
    /// Replicated to every partition.
    All,
}

pub fn partition_count(strategy: JoinStrategy) -> usize {
    match strategy {
        JoinStrategy::Broadcast => 1,
        JoinStrategy::TermKeyed { partitions } => partitions.max(1),
    }
}

fn term_bucket(term: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    term.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

pub fn route(record: &JoinRecord, strategy: JoinStrategy) -> Route {
    match (strategy, record) {
        (JoinStrategy::Broadcast, _) => Route::Partition(0),
        (JoinStrategy::TermKeyed { .. }, JoinRecord::CategoryTotal { .. }) => Route::All,
        (
            JoinStrategy::TermKeyed { partitions },
            JoinRecord::TermTotal { term, .. } | JoinRecord::Observation { term, .. },
        ) => Route::Partition(term_bucket(term, partitions.max(1))),
    }
}

/// Reshapes every aggregated count and groups the records per join partition.
pub fn shuffle(table: CountTable, strategy: JoinStrategy) -> Vec<Vec<JoinRecord>> {
    let n = partition_count(strategy);
    let mut partitions: Vec<Vec<JoinRecord>> = vec![Vec::new(); n];
    for pair in table {
        let record = JoinRecord::from(pair);
        match route(&record, strategy) {
            Route::Partition(i) => partitions[i].push(record),
            Route::All => {
                for p in partitions.iter_mut() {
                    p.push(record.clone());
                }
            }
        }
    }
    partitions
}
