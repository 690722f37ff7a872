use crate::store::FeatureStore;

/// Substring lookup over a precomputed lowercase "track_name artists"
/// string per row. Built once at load time; row order is preserved, so
/// matches come back in store order rather than ranked by relevance.
pub struct TextSearchIndex {
    entries: Vec<String>,
}

impl TextSearchIndex {
    /// Build the index from a loaded store.
    pub fn build(store: &FeatureStore) -> Self {
        let entries = store
            .songs()
            .iter()
            .map(|s| format!("{} {}", s.track_name, s.artists).to_lowercase())
            .collect();
        Self { entries }
    }

    /// Case-insensitive substring search returning at most `limit` row
    /// indices in store order. An empty or all-whitespace query matches
    /// every row; `limit` of 0 matches nothing. No tokenization, no
    /// fuzzy matching.
    pub fn search(&self, query: &str, limit: usize) -> Vec<usize> {
        if limit == 0 {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let match_all = needle.trim().is_empty();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, text)| match_all || text.contains(&needle))
            .map(|(i, _)| i)
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
