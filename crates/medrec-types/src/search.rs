use serde::{Deserialize, Serialize};

/// One page of search results, independent of resource kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub entry: Vec<T>,
    pub total: u64,
    pub has_next_page: bool,
}

impl<T> Default for SearchResult<T> {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            total: 0,
            has_next_page: false,
        }
    }
}

impl<T> SearchResult<T> {
    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
        SearchResult {
            entry: self.entry.into_iter().map(f).collect(),
            total: self.total,
            has_next_page: self.has_next_page,
        }
    }
}
