use crate::models::{SortOption, KEYWORD_PARAM, SORT_PARAM, USAGE_KEY_PARAM};
use crate::params::{MemoryParams, ParamStore, UrlParams};
use url::Url;

/// Current filter selection for one search scope. Keywords, sort, and the
/// pinned usage key route through the param store; the remaining filters
/// live in memory only. The store is a pure value holder: pinning a usage
/// key disables keyword editing in the UI layer, not here.
pub struct FilterState {
    params: Box<dyn ParamStore>,
    block_types_filter: Vec<String>,
    problem_types_filter: Vec<String>,
    tags_filter: Vec<String>,
}

impl FilterState {
    pub fn new(params: Box<dyn ParamStore>) -> Self {
        Self {
            params,
            block_types_filter: Vec::new(),
            problem_types_filter: Vec::new(),
            tags_filter: Vec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryParams::new()))
    }

    pub fn url_synced(url: Url) -> Self {
        Self::new(Box::new(UrlParams::new(url)))
    }

    pub fn search_keywords(&self) -> String {
        self.params.get(KEYWORD_PARAM).unwrap_or_default()
    }

    pub fn set_search_keywords(&mut self, keywords: &str) {
        self.write_param(KEYWORD_PARAM, keywords, "");
    }

    pub fn sort_order(&self) -> SortOption {
        self.params
            .get(SORT_PARAM)
            .map(|value| SortOption::parse(&value))
            .unwrap_or_default()
    }

    pub fn set_sort_order(&mut self, sort: SortOption) {
        self.write_param(SORT_PARAM, sort.as_str(), SortOption::Relevance.as_str());
    }

    pub fn usage_key(&self) -> String {
        self.params.get(USAGE_KEY_PARAM).unwrap_or_default()
    }

    pub fn set_usage_key(&mut self, usage_key: &str) {
        self.write_param(USAGE_KEY_PARAM, usage_key, "");
    }

    // Writing a field's default removes its param instead of storing the
    // literal default string.
    fn write_param(&mut self, name: &str, value: &str, default: &str) {
        if value == default {
            self.params.remove(name);
        } else {
            self.params.set(name, value);
        }
    }

    pub fn block_types_filter(&self) -> &[String] {
        &self.block_types_filter
    }

    pub fn set_block_types_filter(&mut self, block_types: Vec<String>) {
        self.block_types_filter = dedup_preserving_order(block_types);
    }

    pub fn problem_types_filter(&self) -> &[String] {
        &self.problem_types_filter
    }

    pub fn set_problem_types_filter(&mut self, problem_types: Vec<String>) {
        self.problem_types_filter = dedup_preserving_order(problem_types);
    }

    pub fn tags_filter(&self) -> &[String] {
        &self.tags_filter
    }

    pub fn set_tags_filter(&mut self, tags: Vec<String>) {
        self.tags_filter = dedup_preserving_order(tags);
    }

    pub fn add_tag_filter(&mut self, tag_path: &str) {
        if !self.tags_filter.iter().any(|tag| tag == tag_path) {
            self.tags_filter.push(tag_path.to_string());
        }
    }

    pub fn remove_tag_filter(&mut self, tag_path: &str) {
        self.tags_filter.retain(|tag| tag != tag_path);
    }

    pub fn is_filtered(&self) -> bool {
        !self.search_keywords().is_empty() || self.can_clear_filters()
    }

    pub fn can_clear_filters(&self) -> bool {
        !self.block_types_filter.is_empty()
            || !self.problem_types_filter.is_empty()
            || !self.tags_filter.is_empty()
            || !self.usage_key().is_empty()
    }

    /// Resets every filter field; keywords and sort stay untouched.
    pub fn clear_filters(&mut self) {
        self.block_types_filter.clear();
        self.problem_types_filter.clear();
        self.tags_filter.clear();
        self.set_usage_key("");
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}
