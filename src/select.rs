use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{CategoryFeatureSet, ChiSquareResult, FeatureSelection};

/// Ranking used inside a category: higher chi-square first, then term ascending.
pub fn rank(a: &ChiSquareResult, b: &ChiSquareResult) -> Ordering {
    b.chi_square
        .total_cmp(&a.chi_square)
        .then_with(|| a.term.cmp(&b.term))
}

/// Keeps the `top_k` best results of every category and merges their terms.
///
/// Categories without any scored pair do not appear in the selection.
///
/// # Example
/// ```
/// use chi_square_features::{ChiSquareResult, select_features};
///
/// let r = |term: &str, chi: f64| ChiSquareResult {
///     term: term.to_string(),
///     category: "books".to_string(),
///     chi_square: chi,
///     observed: 1,
///     expected: 0.5,
///     total_term: 1,
///     total_category: 2,
/// };
/// let selection = select_features(&[r("plot", 1.5), r("author", 3.0), r("cover", 0.2)], 2);
/// let books = selection.category("books").unwrap();
/// let terms: Vec<&str> = books.features.iter().map(|f| f.term.as_str()).collect();
/// assert_eq!(terms, vec!["author", "plot"]);
/// assert_eq!(selection.vocabulary, vec!["author", "plot"]);
/// ```
pub fn select_features(results: &[ChiSquareResult], top_k: usize) -> FeatureSelection {
    let mut by_category: BTreeMap<&str, Vec<&ChiSquareResult>> = BTreeMap::new();
    for result in results {
        by_category
            .entry(result.category.as_str())
            .or_default()
            .push(result);
    }

    let mut vocabulary: BTreeSet<String> = BTreeSet::new();
    let categories: Vec<CategoryFeatureSet> = by_category
        .into_iter()
        .map(|(category, mut ranked)| {
            ranked.sort_by(|a, b| rank(a, b));
            ranked.truncate(top_k);
            vocabulary.extend(ranked.iter().map(|f| f.term.clone()));
            CategoryFeatureSet {
                category: category.to_string(),
                features: ranked.into_iter().cloned().collect(),
            }
        })
        .collect();

    FeatureSelection {
        categories,
        vocabulary: vocabulary.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(term: &str, category: &str, chi_square: f64) -> ChiSquareResult {
        ChiSquareResult {
            term: term.into(),
            category: category.into(),
            chi_square,
            observed: 1,
            expected: 1.0,
            total_term: 1,
            total_category: 1,
        }
    }

    #[test]
    fn truncates_each_category_to_top_k() {
        let mut results = Vec::new();
        for i in 0..100 {
            results.push(result(&format!("t{i:03}"), "a", i as f64));
        }
        results.push(result("only", "b", 2.0));
        let sel = select_features(&results, 75);

        let a = sel.category("a").unwrap();
        assert_eq!(a.features.len(), 75);
        assert_eq!(a.features[0].term, "t099");
        assert!(
            a.features
                .windows(2)
                .all(|w| w[0].chi_square > w[1].chi_square)
        );
        assert_eq!(sel.category("b").unwrap().features.len(), 1);
        assert_eq!(sel.vocabulary.len(), 76);
    }

    #[test]
    fn ties_break_by_term() {
        let sel = select_features(
            &[
                result("zeta", "a", 1.0),
                result("alpha", "a", 1.0),
                result("mid", "a", 1.0),
            ],
            2,
        );
        let terms: Vec<&str> = sel.categories[0]
            .features
            .iter()
            .map(|f| f.term.as_str())
            .collect();
        assert_eq!(terms, vec!["alpha", "mid"]);
    }

    #[test]
    fn vocabulary_is_sorted_union() {
        let sel = select_features(
            &[
                result("pear", "b", 3.0),
                result("apple", "a", 2.0),
                result("pear", "a", 1.0),
            ],
            75,
        );
        assert_eq!(sel.vocabulary, vec!["apple", "pear"]);
        let cats: Vec<&str> = sel.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(cats, vec!["a", "b"]);
        for term in &sel.vocabulary {
            assert!(
                sel.categories
                    .iter()
                    .any(|c| c.features.iter().any(|f| &f.term == term))
            );
        }
    }

    #[test]
    fn empty_input_gives_empty_selection() {
        let sel = select_features(&[], 75);
        assert!(sel.is_empty());
        assert!(sel.vocabulary.is_empty());
    }
}
