pub mod context;
pub mod error;
pub mod filter_expr;
pub mod filters;
pub mod models;
pub mod pager;
pub mod params;
pub mod query;
pub mod stores;
pub mod tags;
pub mod traits;

pub use context::{ConnectionManager, ConnectionPhase, SearchContext};
pub use error::{ConnectionError, SearchError};
pub use filter_expr::{serialize_filter, FilterExpr};
pub use filters::FilterState;
pub use models::{
    split_highlights, Breadcrumb, CollectionHit, ConnectionDetails, ContentHit, FacetHit,
    FacetSearchRequest, FacetSearchResponse, Formatted, QueryResponse, ResultHit,
    SearchResultPage, SortOption, TagEntry, TagRollup, TextSpan, FACET_CAP, PAGE_SIZE, TAG_SEP,
};
pub use pager::{PageAccumulator, PageState};
pub use params::{MemoryParams, ParamStore, UrlParams};
pub use query::{build_search_queries, filter_groups, QueryDescriptor};
pub use stores::{MeilisearchStore, RestConnectionSource, StaticConnectionSource};
pub use tags::{
    fetch_tag_options, fetch_tags_matching_keyword, filter_by_keyword_matches, TagOptions,
};
pub use traits::{ConnectionSource, SearchBackend};
