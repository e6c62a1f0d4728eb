use serde::{Deserialize, Serialize};

/// One categorized document, already tokenized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub category: String,
    pub tokens: Vec<String>,
}

impl Document {
    pub fn new<C, I, T>(category: C, tokens: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            category: category.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

/// Key of a raw or aggregated document count.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountKey {
    /// Documents in a category.
    DocCount(String),
    /// Documents of a category containing a term.
    TermCategory { term: String, category: String },
    /// Documents containing a term, over all categories.
    TermTotal(String),
}

/// Chi-square score of one (term, category) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub term: String,
    pub category: String,
    pub chi_square: f64,
    /// Cell A: documents of the category containing the term.
    pub observed: u64,
    pub expected: f64,
    pub total_term: u64,
    pub total_category: u64,
}

/// Top scoring terms of one category, best first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryFeatureSet {
    pub category: String,
    pub features: Vec<ChiSquareResult>,
}

/// Feature sets of all categories plus their merged, sorted vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    /// Sorted by category name.
    pub categories: Vec<CategoryFeatureSet>,
    pub vocabulary: Vec<String>,
}

impl FeatureSelection {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryFeatureSet> {
        self.categories.iter().find(|c| c.category == name)
    }
}
