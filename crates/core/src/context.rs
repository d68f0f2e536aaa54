use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::error::{ConnectionError, SearchError};
use crate::filter_expr::FilterExpr;
use crate::filters::FilterState;
use crate::models::{
    ConnectionDetails, QueryResponse, ResultHit, SearchResultPage, SortOption, BLOCK_TYPE_FACET,
    PAGE_SIZE, PROBLEM_TYPES_FACET,
};
use crate::pager::{PageAccumulator, PageState};
use crate::query::{build_search_queries, filter_groups};
use crate::stores::MeilisearchStore;
use crate::tags::{
    fetch_tag_options, fetch_tags_matching_keyword, filter_by_keyword_matches, TagOptions,
};
use crate::traits::{ConnectionSource, SearchBackend};

const CONNECTION_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Uninitialized,
    Connecting,
    Ready,
    Failed,
}

/// Owns the connection-details lifecycle for one search scope: fetched
/// once, cached for up to an hour, and a fetch failure is permanent for
/// the instance. No retry loop beyond whatever the caller applies.
pub struct ConnectionManager<C: ConnectionSource> {
    source: C,
    phase: ConnectionPhase,
    cached: Option<(ConnectionDetails, DateTime<Utc>)>,
}

impl<C: ConnectionSource + Sync> ConnectionManager<C> {
    pub fn new(source: C) -> Self {
        Self {
            source,
            phase: ConnectionPhase::Uninitialized,
            cached: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn has_connection_error(&self) -> bool {
        self.phase == ConnectionPhase::Failed
    }

    pub async fn details(&mut self) -> Result<ConnectionDetails, ConnectionError> {
        if self.phase == ConnectionPhase::Failed {
            return Err(ConnectionError::Unavailable);
        }

        if let Some((details, fetched_at)) = &self.cached {
            if Utc::now() - *fetched_at < Duration::seconds(CONNECTION_TTL_SECONDS) {
                return Ok(details.clone());
            }
        }

        self.phase = ConnectionPhase::Connecting;
        match self.source.fetch_connection().await {
            Ok(details) => {
                self.cached = Some((details.clone(), Utc::now()));
                self.phase = ConnectionPhase::Ready;
                Ok(details)
            }
            Err(error) => {
                self.phase = ConnectionPhase::Failed;
                Err(error)
            }
        }
    }
}

/// Identity of one page request. Responses are cached under this key, so
/// an in-flight response for an abandoned filter generation lands in an
/// entry nobody reads instead of overwriting newer state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    keywords: String,
    block_types: Vec<String>,
    problem_types: Vec<String>,
    tags: Vec<String>,
    usage_key: String,
    sort: SortOption,
    extra_filter: Vec<FilterExpr>,
    want_distribution: bool,
    offset: usize,
}

/// One reactive search scope: filter state, pagination, distribution
/// counts, and tag facets over a single backend. Constructed once per
/// logical scope and passed by reference; independent scopes never share
/// state.
pub struct SearchContext<B: SearchBackend> {
    backend: B,
    index_uid: String,
    filters: FilterState,
    extra_filter: Vec<FilterExpr>,
    fetch_distribution: bool,
    pager: PageAccumulator,
    page_cache: HashMap<QueryKey, SearchResultPage>,
    block_type_counts: BTreeMap<String, u64>,
    problem_type_counts: BTreeMap<String, u64>,
}

impl SearchContext<MeilisearchStore> {
    /// Connects a scope through the manager, constructing the search
    /// client from the fetched details.
    pub async fn connect<C: ConnectionSource + Sync>(
        manager: &mut ConnectionManager<C>,
        filters: FilterState,
        extra_filter: Vec<FilterExpr>,
    ) -> Result<Self, ConnectionError> {
        let details = manager.details().await?;
        Ok(Self::new(
            MeilisearchStore::from_connection(&details),
            details.index_name,
            filters,
            extra_filter,
        ))
    }
}

impl<B: SearchBackend + Sync> SearchContext<B> {
    pub fn new(
        backend: B,
        index_uid: impl Into<String>,
        filters: FilterState,
        extra_filter: Vec<FilterExpr>,
    ) -> Self {
        Self {
            backend,
            index_uid: index_uid.into(),
            filters,
            extra_filter,
            fetch_distribution: true,
            pager: PageAccumulator::new(),
            page_cache: HashMap::new(),
            block_type_counts: BTreeMap::new(),
            problem_type_counts: BTreeMap::new(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    /// Skipping the distribution query drops the second element of the
    /// batch when the caller has no use for type counts.
    pub fn set_fetch_distribution(&mut self, fetch: bool) {
        self.fetch_distribution = fetch;
    }

    pub fn set_search_keywords(&mut self, keywords: &str) {
        self.filters.set_search_keywords(keywords);
        self.pager.reset();
    }

    pub fn set_block_types_filter(&mut self, block_types: Vec<String>) {
        self.filters.set_block_types_filter(block_types);
        self.pager.reset();
    }

    pub fn set_problem_types_filter(&mut self, problem_types: Vec<String>) {
        self.filters.set_problem_types_filter(problem_types);
        self.pager.reset();
    }

    pub fn set_tags_filter(&mut self, tags: Vec<String>) {
        self.filters.set_tags_filter(tags);
        self.pager.reset();
    }

    pub fn add_tag_filter(&mut self, tag_path: &str) {
        self.filters.add_tag_filter(tag_path);
        self.pager.reset();
    }

    pub fn remove_tag_filter(&mut self, tag_path: &str) {
        self.filters.remove_tag_filter(tag_path);
        self.pager.reset();
    }

    pub fn set_usage_key(&mut self, usage_key: &str) {
        self.filters.set_usage_key(usage_key);
        self.pager.reset();
    }

    pub fn set_sort_order(&mut self, sort: SortOption) {
        self.filters.set_sort_order(sort);
        self.pager.reset();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear_filters();
        self.pager.reset();
    }

    pub fn sort_order(&self) -> SortOption {
        self.filters.sort_order()
    }

    pub fn usage_key(&self) -> String {
        self.filters.usage_key()
    }

    pub fn is_filtered(&self) -> bool {
        self.filters.is_filtered()
    }

    pub fn can_clear_filters(&self) -> bool {
        self.filters.can_clear_filters()
    }

    pub fn hits(&self) -> &[ResultHit] {
        self.pager.hits()
    }

    pub fn total_hits(&self) -> usize {
        self.pager.total_hits()
    }

    pub fn has_next_page(&self) -> bool {
        self.pager.has_next_page()
    }

    pub fn is_loading(&self) -> bool {
        self.pager.is_loading()
    }

    pub fn page_state(&self) -> PageState {
        self.pager.state()
    }

    pub fn search_error(&self) -> Option<&str> {
        self.pager.error()
    }

    pub fn block_type_counts(&self) -> &BTreeMap<String, u64> {
        &self.block_type_counts
    }

    pub fn problem_type_counts(&self) -> &BTreeMap<String, u64> {
        &self.problem_type_counts
    }

    /// Fetches the next page of the current generation. A no-op while a
    /// fetch is in flight or when the last page was short.
    pub async fn fetch_next_page(&mut self) -> Result<(), SearchError> {
        let Some(offset) = self.pager.begin_fetch() else {
            return Ok(());
        };

        let key = self.query_key(offset);
        if let Some(page) = self.page_cache.get(&key).cloned() {
            self.apply_page(page);
            return Ok(());
        }

        let queries = build_search_queries(
            &self.index_uid,
            &self.filters,
            &self.extra_filter,
            offset,
            self.fetch_distribution,
        );

        match self.backend.multi_search(&queries).await {
            Ok(responses) => match page_from_responses(responses, offset) {
                Ok(page) => {
                    self.page_cache.insert(key, page.clone());
                    self.apply_page(page);
                    Ok(())
                }
                Err(error) => {
                    self.pager.fail(error.to_string());
                    Err(error)
                }
            },
            Err(error) => {
                self.pager.fail(error.to_string());
                Err(error)
            }
        }
    }

    /// Resolves the selectable tag facets beneath `parent_tag_path`,
    /// intersected with an optional keyword-across-tags match. The two
    /// lookups run concurrently and are reconciled once both complete.
    pub async fn tag_options(
        &self,
        parent_tag_path: Option<&str>,
        tag_keywords: Option<&str>,
    ) -> Result<TagOptions, SearchError> {
        let groups = filter_groups(&self.filters, &self.extra_filter);
        let keywords = tag_keywords.map(str::trim).filter(|value| !value.is_empty());

        let (options, matches) = tokio::try_join!(
            fetch_tag_options(&self.backend, &self.index_uid, &groups, parent_tag_path),
            async {
                match keywords {
                    Some(value) => {
                        fetch_tags_matching_keyword(&self.backend, &self.index_uid, &groups, value)
                            .await
                            .map(Some)
                    }
                    None => Ok(None),
                }
            }
        )?;

        Ok(filter_by_keyword_matches(options, matches.as_ref()))
    }

    fn query_key(&self, offset: usize) -> QueryKey {
        QueryKey {
            keywords: self.filters.search_keywords(),
            block_types: self.filters.block_types_filter().to_vec(),
            problem_types: self.filters.problem_types_filter().to_vec(),
            tags: self.filters.tags_filter().to_vec(),
            usage_key: self.filters.usage_key(),
            sort: self.filters.sort_order(),
            extra_filter: self.extra_filter.clone(),
            want_distribution: self.fetch_distribution,
            offset,
        }
    }

    fn apply_page(&mut self, page: SearchResultPage) {
        if !page.block_type_counts.is_empty() || !page.problem_type_counts.is_empty() {
            self.block_type_counts = page.block_type_counts.clone();
            self.problem_type_counts = page.problem_type_counts.clone();
        }
        self.pager.complete(page);
    }
}

fn page_from_responses(
    responses: Vec<QueryResponse>,
    offset: usize,
) -> Result<SearchResultPage, SearchError> {
    let mut responses = responses.into_iter();
    let Some(hits_response) = responses.next() else {
        return Err(SearchError::Request(
            "multi-search returned no results".to_string(),
        ));
    };

    let (block_type_counts, problem_type_counts) = match responses
        .next()
        .and_then(|response| response.facet_distribution)
    {
        Some(mut distribution) => (
            distribution.remove(BLOCK_TYPE_FACET).unwrap_or_default(),
            distribution.remove(PROBLEM_TYPES_FACET).unwrap_or_default(),
        ),
        None => (BTreeMap::new(), BTreeMap::new()),
    };

    let next_offset = (hits_response.hits.len() == PAGE_SIZE).then_some(offset + PAGE_SIZE);

    Ok(SearchResultPage {
        hits: hits_response.hits,
        next_offset,
        total_hits: hits_response.total_hits,
        block_type_counts,
        problem_type_counts,
    })
}
