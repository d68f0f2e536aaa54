use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between segments of a hierarchical tag path.
pub const TAG_SEP: &str = " > ";

/// Hits requested per page of main search results.
pub const PAGE_SIZE: usize = 20;

/// Maximum distinct values the backend returns for one facet query.
pub const FACET_CAP: usize = 100;

/// Document limit for the best-effort keyword-across-tags search.
pub const TAG_KEYWORD_DOC_CAP: usize = 1000;

/// Deepest supported tag level (`tags.level0` through `tags.level3`).
pub const MAX_TAG_DEPTH: usize = 4;

pub const HIGHLIGHT_PRE_TAG: &str = "__search-highlight__";
pub const HIGHLIGHT_POST_TAG: &str = "__/search-highlight__";

pub const KEYWORD_PARAM: &str = "q";
pub const SORT_PARAM: &str = "sort";
pub const USAGE_KEY_PARAM: &str = "usageKey";

pub const BLOCK_TYPE_FACET: &str = "block_type";
pub const PROBLEM_TYPES_FACET: &str = "content.problem_types";
pub const TAXONOMY_FACET: &str = "tags.taxonomy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOption {
    #[default]
    Relevance,
    TitleAz,
    TitleZa,
    Newest,
    Oldest,
    RecentlyPublished,
    RecentlyModified,
}

impl SortOption {
    /// Wire value, also used verbatim as the URL param value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Relevance => "",
            SortOption::TitleAz => "display_name:asc",
            SortOption::TitleZa => "display_name:desc",
            SortOption::Newest => "created:desc",
            SortOption::Oldest => "created:asc",
            SortOption::RecentlyPublished => "last_published:desc",
            SortOption::RecentlyModified => "modified:desc",
        }
    }

    /// Unknown values coerce to relevance rather than erroring.
    pub fn parse(value: &str) -> Self {
        match value {
            "display_name:asc" => SortOption::TitleAz,
            "display_name:desc" => SortOption::TitleZa,
            "created:desc" => SortOption::Newest,
            "created:asc" => SortOption::Oldest,
            "last_published:desc" => SortOption::RecentlyPublished,
            "modified:desc" => SortOption::RecentlyModified,
            _ => SortOption::Relevance,
        }
    }

    /// Sort directive for the hits query; relevance keeps keyword ranking.
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            SortOption::Relevance => None,
            other => Some(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRollup {
    pub taxonomy: Vec<String>,
    pub level0: Vec<String>,
    pub level1: Vec<String>,
    pub level2: Vec<String>,
    pub level3: Vec<String>,
}

impl TagRollup {
    pub fn all_paths(&self) -> impl Iterator<Item = &str> {
        self.taxonomy
            .iter()
            .chain(&self.level0)
            .chain(&self.level1)
            .chain(&self.level2)
            .chain(&self.level3)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breadcrumb {
    pub display_name: String,
    pub usage_key: Option<String>,
}

/// Highlighted variants of text fields, with matches wrapped in the
/// pre/post marker pair. Markers pass through parsing unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formatted {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentHit {
    pub id: String,
    pub usage_key: String,
    pub block_id: String,
    pub block_type: String,
    pub display_name: String,
    pub context_key: String,
    pub org: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub tags: TagRollup,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub created: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_published: Option<DateTime<Utc>>,
    #[serde(rename = "_formatted")]
    pub formatted: Formatted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionHit {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub num_children: Option<u64>,
    #[serde(rename = "_formatted")]
    pub formatted: Formatted,
}

/// One search result record. Collections are distinguished by the indexed
/// `type` field; everything else is an indexed content item.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultHit {
    Content(ContentHit),
    Collection(CollectionHit),
}

impl ResultHit {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let is_collection = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| kind == "collection");

        if is_collection {
            Ok(ResultHit::Collection(serde_json::from_value(value)?))
        } else {
            Ok(ResultHit::Content(serde_json::from_value(value)?))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ResultHit::Content(hit) => &hit.id,
            ResultHit::Collection(hit) => &hit.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ResultHit::Content(hit) => &hit.display_name,
            ResultHit::Collection(hit) => &hit.display_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResultPage {
    pub hits: Vec<ResultHit>,
    pub next_offset: Option<usize>,
    pub total_hits: usize,
    pub block_type_counts: BTreeMap<String, u64>,
    pub problem_type_counts: BTreeMap<String, u64>,
}

/// One node of the dynamically-traversed tag tree. Recomputed per query;
/// parent/child relation is positional on `tag_path`, not via pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub tag_name: String,
    pub tag_path: String,
    pub tag_count: u64,
    pub has_children: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub url: String,
    pub index_name: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSearchRequest {
    #[serde(skip)]
    pub index_uid: String,
    pub facet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub filter: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetHit {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSearchResponse {
    pub facet_hits: Vec<FacetHit>,
}

/// Parsed result of one query in a batched multi-query call.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub hits: Vec<ResultHit>,
    pub total_hits: usize,
    pub facet_distribution: Option<BTreeMap<String, BTreeMap<String, u64>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSpan {
    Plain(String),
    Emphasis(String),
}

/// Splits a formatted field into plain and emphasized spans using the
/// highlight marker convention. An unmatched pre marker is treated as
/// literal text.
pub fn split_highlights(formatted: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut rest = formatted;

    while let Some(start) = rest.find(HIGHLIGHT_PRE_TAG) {
        let after_pre = &rest[start + HIGHLIGHT_PRE_TAG.len()..];
        let Some(end) = after_pre.find(HIGHLIGHT_POST_TAG) else {
            break;
        };

        if start > 0 {
            spans.push(TextSpan::Plain(rest[..start].to_string()));
        }
        spans.push(TextSpan::Emphasis(after_pre[..end].to_string()));
        rest = &after_pre[end + HIGHLIGHT_POST_TAG.len()..];
    }

    if !rest.is_empty() {
        spans.push(TextSpan::Plain(rest.to_string()));
    }

    spans
}
