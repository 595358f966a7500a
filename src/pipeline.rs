//! Query/result source
//!
//! Holds the latest query values and result set returned by the search
//! service. Listeners read from it (through `ResultSource`) whenever the
//! session announces that results changed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query parameters as sent to the search service, keyed by field name
/// (e.g. "q" for the typed text, "q.used" for the autocompleted text).
pub type QueryValues = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<SearchResult>,
    /// Total matches reported by the service (may exceed `results.len()`)
    #[serde(default)]
    pub total: usize,
}

impl ResultSet {
    pub fn new(results: Vec<SearchResult>) -> Self {
        let total = results.len();
        Self { results, total }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Read side of the search pipeline
pub trait ResultSource {
    fn results(&self) -> Option<&ResultSet>;
    fn query_values(&self) -> Option<&QueryValues>;
}

/// In-memory pipeline state: whatever the last search response left behind
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    values: Option<QueryValues>,
    results: Option<ResultSet>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query_values(&mut self, values: Option<QueryValues>) {
        self.values = values;
    }

    pub fn set_results(&mut self, results: Option<ResultSet>) {
        self.results = results;
    }

    pub fn clear(&mut self) {
        self.values = None;
        self.results = None;
    }
}

impl ResultSource for Pipeline {
    fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    fn query_values(&self) -> Option<&QueryValues> {
        self.values.as_ref()
    }
}
