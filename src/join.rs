//! The chi-square join: collects tagged counts of one partition, then scores every observation.

use std::collections::HashMap;

use log::debug;

use crate::error::{ChiSquareError, Result};
use crate::reshape::JoinRecord;
use crate::types::ChiSquareResult;

/// Cells of the 2x2 contingency table of one (term, category) pair.
///
/// `a`: in category with term, `b`: with term elsewhere,
/// `c`: in category without term, `d`: neither. `a + b + c + d == n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contingency {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    pub n: i64,
}

impl Contingency {
    pub fn from_totals(a: u64, term_total: u64, category_total: u64, n: u64) -> Self {
        let (a, term_total, category_total, n) =
            (a as i64, term_total as i64, category_total as i64, n as i64);
        let b = term_total - a;
        let c = category_total - a;
        let d = n - a - b - c;
        Self { a, b, c, d, n }
    }

    pub fn is_consistent(&self) -> bool {
        self.a >= 0 && self.b >= 0 && self.c >= 0 && self.d >= 0
    }

    /// Row and column sums `A+B`, `C+D`, `A+C`, `B+D`.
    fn marginals(&self) -> [i64; 4] {
        [
            self.a + self.b,
            self.c + self.d,
            self.a + self.c,
            self.b + self.d,
        ]
    }

    /// A zero marginal makes the statistic undefined.
    pub fn is_degenerate(&self) -> bool {
        self.marginals().contains(&0)
    }

    /// `N (AD - BC)^2 / ((A+B)(C+D)(A+C)(B+D))`, or `None` for a degenerate table.
    ///
    /// The product of the marginals exceeds `i128` once `N` passes a few
    /// billion, so it is taken in `f64`.
    pub fn chi_square(&self) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        let denom: f64 = self.marginals().iter().map(|&m| m as f64).product();
        let det = self.a as i128 * self.d as i128 - self.b as i128 * self.c as i128;
        let det = det as f64;
        Some(self.n as f64 * det * det / denom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinState {
    Collecting,
    Computing,
    Done,
}

/// Join state of one partition.
///
/// Records are demultiplexed into in-memory tables while `Collecting`.
/// [`JoinPartition::finish`] marks the end of input, scores all observations
/// and releases the tables; a finished partition accepts nothing further.
#[derive(Debug)]
pub struct JoinPartition {
    id: usize,
    state: JoinState,
    category_totals: HashMap<String, u64>,
    term_totals: HashMap<String, u64>,
    observations: Vec<(String, String, u64)>,
}

impl JoinPartition {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: JoinState::Collecting,
            category_totals: HashMap::new(),
            term_totals: HashMap::new(),
            observations: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn push(&mut self, record: JoinRecord) -> Result<()> {
        if self.state != JoinState::Collecting {
            return Err(ChiSquareError::PartitionFinished(self.id));
        }
        match record {
            JoinRecord::CategoryTotal { category, count } => {
                *self.category_totals.entry(category).or_insert(0) += count;
            }
            JoinRecord::TermTotal { term, count } => {
                *self.term_totals.entry(term).or_insert(0) += count;
            }
            JoinRecord::Observation {
                term,
                category,
                count,
            } => self.observations.push((term, category, count)),
        }
        Ok(())
    }

    /// Scores every observation of this partition.
    ///
    /// Degenerate tables are dropped. A negative cell aborts the partition
    /// with [`ChiSquareError::Integrity`].
    pub fn finish(&mut self) -> Result<Vec<ChiSquareResult>> {
        if self.state != JoinState::Collecting {
            return Err(ChiSquareError::PartitionFinished(self.id));
        }
        self.state = JoinState::Computing;
        let category_totals = std::mem::take(&mut self.category_totals);
        let term_totals = std::mem::take(&mut self.term_totals);
        let observations = std::mem::take(&mut self.observations);

        let n: u64 = category_totals.values().sum();
        let mut results = Vec::with_capacity(observations.len());
        let mut degenerate = 0usize;

        for (term, category, a) in observations {
            let total_term = term_totals.get(&term).copied().unwrap_or(0);
            let total_category = category_totals.get(&category).copied().unwrap_or(0);
            let table = Contingency::from_totals(a, total_term, total_category, n);
            if !table.is_consistent() {
                self.state = JoinState::Done;
                return Err(ChiSquareError::Integrity {
                    term,
                    category,
                    a: table.a,
                    b: table.b,
                    c: table.c,
                    d: table.d,
                });
            }
            let Some(chi_square) = table.chi_square() else {
                degenerate += 1;
                continue;
            };
            let expected = if n == 0 {
                0.0
            } else {
                total_term as f64 * total_category as f64 / n as f64
            };
            results.push(ChiSquareResult {
                term,
                category,
                chi_square,
                observed: a,
                expected,
                total_term,
                total_category,
            });
        }

        debug!(
            "partition {}: N={}, scored {} pairs, dropped {} degenerate",
            self.id,
            n,
            results.len(),
            degenerate
        );
        self.state = JoinState::Done;
        Ok(results)
    }
}

/// Runs one partition over its routed records.
pub fn join_partition(id: usize, records: Vec<JoinRecord>) -> Result<Vec<ChiSquareResult>> {
    let mut partition = JoinPartition::new(id);
    for record in records {
        partition.push(record)?;
    }
    partition.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(category: &str, count: u64) -> JoinRecord {
        JoinRecord::CategoryTotal {
            category: category.into(),
            count,
        }
    }

    fn term(term: &str, count: u64) -> JoinRecord {
        JoinRecord::TermTotal {
            term: term.into(),
            count,
        }
    }

    fn obs(term: &str, category: &str, count: u64) -> JoinRecord {
        JoinRecord::Observation {
            term: term.into(),
            category: category.into(),
            count,
        }
    }

    fn four_doc_records() -> Vec<JoinRecord> {
        vec![
            cat("A", 2),
            cat("B", 2),
            term("x", 2),
            term("y", 2),
            term("z", 1),
            obs("x", "A", 2),
            obs("y", "A", 1),
            obs("y", "B", 1),
            obs("z", "B", 1),
        ]
    }

    fn find<'a>(results: &'a [ChiSquareResult], t: &str, c: &str) -> Option<&'a ChiSquareResult> {
        results.iter().find(|r| r.term == t && r.category == c)
    }

    #[test]
    fn contingency_cells_sum_to_n() {
        let t = Contingency::from_totals(1, 1, 2, 4);
        assert_eq!((t.a, t.b, t.c, t.d), (1, 0, 1, 2));
        assert_eq!(t.a + t.b + t.c + t.d, t.n);
        let chi = t.chi_square().unwrap();
        assert!((chi - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn large_corpus_does_not_overflow() {
        // every marginal is in the billions; their product exceeds i128::MAX
        let t =
            Contingency::from_totals(3_000_000_000, 4_000_000_000, 5_000_000_000, 10_000_000_000);
        assert_eq!((t.b, t.c, t.d), (1_000_000_000, 2_000_000_000, 4_000_000_000));
        assert!(!t.is_degenerate());
        let chi = t.chi_square().unwrap();
        assert!(chi.is_finite());
        let expected = 1e10 / 6.0;
        assert!((chi - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn scores_the_four_document_corpus() {
        let results = join_partition(0, four_doc_records()).unwrap();

        let xa = find(&results, "x", "A").unwrap();
        assert!((xa.chi_square - 4.0).abs() < 1e-9);
        assert_eq!(xa.observed, 2);
        assert_eq!(xa.total_term, 2);
        assert_eq!(xa.total_category, 2);
        assert!((xa.expected - 1.0).abs() < 1e-9);

        let zb = find(&results, "z", "B").unwrap();
        assert!((zb.chi_square - 4.0 / 3.0).abs() < 1e-9);

        // y occurs once in each category: independent, but defined
        let ya = find(&results, "y", "A").unwrap();
        assert_eq!(ya.chi_square, 0.0);
    }

    #[test]
    fn degenerate_pairs_are_dropped() {
        let results = join_partition(0, vec![cat("A", 1), term("x", 1), obs("x", "A", 1)]).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        let results = join_partition(0, vec![obs("x", "A", 0)]).unwrap();
        assert!(results.is_empty());
        assert!(join_partition(0, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn negative_cell_is_an_integrity_error() {
        // term total smaller than its per-category count: B < 0
        let err = join_partition(3, vec![cat("A", 4), cat("B", 4), term("x", 1), obs("x", "A", 2)])
            .unwrap_err();
        match err {
            ChiSquareError::Integrity { term, b, .. } => {
                assert_eq!(term, "x");
                assert_eq!(b, -1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_totals_default_to_zero() {
        // no term total for "x": B = -A, surfaced instead of scored
        let err = join_partition(0, vec![cat("A", 2), cat("B", 2), obs("x", "A", 1)]);
        assert!(matches!(err, Err(ChiSquareError::Integrity { .. })));

        // no observation for a term: nothing to score, no failure
        let ok = join_partition(0, vec![cat("A", 2), term("x", 1)]).unwrap();
        assert!(ok.is_empty());
    }

    #[test]
    fn finished_partition_rejects_input() {
        let mut p = JoinPartition::new(7);
        p.push(cat("A", 1)).unwrap();
        assert_eq!(p.state(), JoinState::Collecting);
        p.finish().unwrap();
        assert_eq!(p.state(), JoinState::Done);
        assert!(matches!(
            p.push(cat("A", 1)),
            Err(ChiSquareError::PartitionFinished(7))
        ));
        assert!(p.finish().is_err());
    }
}
