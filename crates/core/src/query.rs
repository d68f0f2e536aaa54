use serde::Serialize;
use serde_json::Value;

use crate::filter_expr::{serialize_filter, FilterExpr};
use crate::filters::FilterState;
use crate::models::{
    SortOption, BLOCK_TYPE_FACET, HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG, PAGE_SIZE,
    PROBLEM_TYPES_FACET, TAG_SEP, TAXONOMY_FACET,
};

/// One structured query in a batched multi-query call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub index_uid: String,
    pub q: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub filter: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_highlight: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_pre_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_post_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_search_on: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<Vec<String>>,
}

impl QueryDescriptor {
    pub fn new(index_uid: impl Into<String>) -> Self {
        Self {
            index_uid: index_uid.into(),
            q: String::new(),
            filter: Value::Null,
            sort: None,
            offset: None,
            limit: PAGE_SIZE,
            facets: None,
            attributes_to_highlight: None,
            highlight_pre_tag: None,
            highlight_post_tag: None,
            attributes_to_search_on: None,
            attributes_to_retrieve: None,
        }
    }
}

/// AND-ed constraint groups derived from the filter state: caller-supplied
/// static constraints, the pinned usage key, one OR-group flattening block
/// types with problem sub-types, and one equality per selected tag path.
pub fn filter_groups(filters: &FilterState, extra_filter: &[FilterExpr]) -> Vec<FilterExpr> {
    let mut groups: Vec<FilterExpr> = extra_filter.to_vec();

    let usage_key = filters.usage_key();
    if !usage_key.is_empty() {
        groups.push(FilterExpr::eq("usage_key", usage_key));
    }

    let type_predicates: Vec<FilterExpr> = filters
        .block_types_filter()
        .iter()
        .map(|block_type| FilterExpr::eq(BLOCK_TYPE_FACET, block_type.clone()))
        .chain(
            filters
                .problem_types_filter()
                .iter()
                .map(|problem_type| FilterExpr::eq(PROBLEM_TYPES_FACET, problem_type.clone())),
        )
        .collect();
    if !type_predicates.is_empty() {
        groups.push(FilterExpr::Or(type_predicates));
    }

    for tag_path in filters.tags_filter() {
        groups.push(tag_filter_predicate(tag_path));
    }

    groups
}

/// A path with N segments constrains facet attribute `tags.level(N-2)`;
/// a bare taxonomy name constrains the root attribute.
fn tag_filter_predicate(tag_path: &str) -> FilterExpr {
    let segments = tag_path.split(TAG_SEP).count();
    if segments <= 1 {
        FilterExpr::eq(TAXONOMY_FACET, tag_path)
    } else {
        FilterExpr::eq(format!("tags.level{}", segments - 2), tag_path)
    }
}

/// Builds the batched query list: element 0 is the hits query, element 1
/// (when `want_distribution`) a zero-limit facet query for block-type and
/// problem-type counts. The distribution query drops the type OR-group so
/// counts cover unselected types too.
pub fn build_search_queries(
    index_uid: &str,
    filters: &FilterState,
    extra_filter: &[FilterExpr],
    offset: usize,
    want_distribution: bool,
) -> Vec<QueryDescriptor> {
    let mut groups = filter_groups(filters, extra_filter);

    let sort = filters.sort_order();
    if sort == SortOption::RecentlyPublished {
        // Hidden coupling: never-published items are excluded from this
        // sort, not surfaced as a user-visible filter.
        groups.push(FilterExpr::not_null("last_published"));
    }

    // Pinning a single item disables keyword search.
    let keywords = if filters.usage_key().is_empty() {
        filters.search_keywords()
    } else {
        String::new()
    };

    let mut hits_query = QueryDescriptor::new(index_uid);
    hits_query.q = keywords.clone();
    hits_query.filter = serialize_filter(&groups);
    hits_query.sort = sort.directive().map(|directive| vec![directive.to_string()]);
    hits_query.offset = Some(offset);
    hits_query.attributes_to_highlight = Some(vec![
        "display_name".to_string(),
        "description".to_string(),
        "content".to_string(),
    ]);
    hits_query.highlight_pre_tag = Some(HIGHLIGHT_PRE_TAG.to_string());
    hits_query.highlight_post_tag = Some(HIGHLIGHT_POST_TAG.to_string());

    let mut queries = vec![hits_query];

    if want_distribution {
        let mut distribution_groups: Vec<FilterExpr> = extra_filter.to_vec();
        let usage_key = filters.usage_key();
        if !usage_key.is_empty() {
            distribution_groups.push(FilterExpr::eq("usage_key", usage_key));
        }
        for tag_path in filters.tags_filter() {
            distribution_groups.push(tag_filter_predicate(tag_path));
        }

        let mut facet_query = QueryDescriptor::new(index_uid);
        facet_query.q = keywords;
        facet_query.filter = serialize_filter(&distribution_groups);
        facet_query.limit = 0;
        facet_query.facets = Some(vec![
            BLOCK_TYPE_FACET.to_string(),
            PROBLEM_TYPES_FACET.to_string(),
        ]);
        queries.push(facet_query);
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters_with(
        block_types: &[&str],
        problem_types: &[&str],
        tags: &[&str],
    ) -> FilterState {
        let mut filters = FilterState::in_memory();
        filters.set_block_types_filter(block_types.iter().map(|s| s.to_string()).collect());
        filters.set_problem_types_filter(problem_types.iter().map(|s| s.to_string()).collect());
        filters.set_tags_filter(tags.iter().map(|s| s.to_string()).collect());
        filters
    }

    #[test]
    fn block_and_problem_types_share_one_or_group() {
        let filters = filters_with(&["html", "problem"], &["mcq"], &["Subject > Math"]);
        let queries = build_search_queries("studio", &filters, &[], 0, false);

        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].filter,
            json!([
                [
                    "block_type = \"html\"",
                    "block_type = \"problem\"",
                    "content.problem_types = \"mcq\"",
                ],
                "tags.level0 = \"Subject > Math\"",
            ])
        );
    }

    #[test]
    fn tag_paths_map_to_their_level_attribute() {
        let filters = filters_with(&[], &[], &["Subject", "Subject > Math > Algebra"]);
        let queries = build_search_queries("studio", &filters, &[], 0, false);

        assert_eq!(
            queries[0].filter,
            json!([
                "tags.taxonomy = \"Subject\"",
                "tags.level1 = \"Subject > Math > Algebra\"",
            ])
        );
    }

    #[test]
    fn tag_filters_are_anded_never_ored() {
        let filters = filters_with(&[], &[], &["Subject > Math", "Difficulty > Hard"]);
        let queries = build_search_queries("studio", &filters, &[], 0, false);

        // Two separate outer elements, no inner array.
        assert_eq!(
            queries[0].filter,
            json!([
                "tags.level0 = \"Subject > Math\"",
                "tags.level0 = \"Difficulty > Hard\"",
            ])
        );
    }

    #[test]
    fn recently_published_sort_excludes_never_published() {
        let mut filters = FilterState::in_memory();
        filters.set_sort_order(SortOption::RecentlyPublished);
        let queries = build_search_queries("studio", &filters, &[], 0, false);

        assert_eq!(queries[0].filter, json!(["last_published IS NOT NULL"]));
        assert_eq!(
            queries[0].sort,
            Some(vec!["last_published:desc".to_string()])
        );
    }

    #[test]
    fn relevance_sort_sends_no_directive() {
        let filters = FilterState::in_memory();
        let queries = build_search_queries("studio", &filters, &[], 0, false);
        assert_eq!(queries[0].sort, None);
        assert_eq!(queries[0].offset, Some(0));
        assert_eq!(queries[0].limit, PAGE_SIZE);
    }

    #[test]
    fn pinned_usage_key_disables_keyword_text() {
        let mut filters = FilterState::in_memory();
        filters.set_search_keywords("pump");
        filters.set_usage_key("block-v1:demo");
        let queries = build_search_queries("studio", &filters, &[], 0, false);

        assert_eq!(queries[0].q, "");
        assert_eq!(queries[0].filter, json!(["usage_key = \"block-v1:demo\""]));
    }

    #[test]
    fn distribution_query_drops_the_type_group() {
        let filters = filters_with(&["html"], &[], &["Subject > Math"]);
        let queries =
            build_search_queries("studio", &filters, &[FilterExpr::eq("context_key", "lib:1")], 20, true);

        assert_eq!(queries.len(), 2);
        let facet_query = &queries[1];
        assert_eq!(facet_query.limit, 0);
        assert_eq!(
            facet_query.facets,
            Some(vec![
                "block_type".to_string(),
                "content.problem_types".to_string(),
            ])
        );
        assert_eq!(
            facet_query.filter,
            json!([
                "context_key = \"lib:1\"",
                "tags.level0 = \"Subject > Math\"",
            ])
        );

        // The hits query keeps everything, including the caller constraint.
        assert_eq!(
            queries[0].filter,
            json!([
                "context_key = \"lib:1\"",
                ["block_type = \"html\""],
                "tags.level0 = \"Subject > Math\"",
            ])
        );
        assert_eq!(queries[0].offset, Some(20));
    }

    #[test]
    fn descriptors_serialize_camel_case_and_elide_nulls() {
        let filters = FilterState::in_memory();
        let queries = build_search_queries("studio", &filters, &[], 0, false);
        let body = serde_json::to_value(&queries[0]).unwrap();

        assert_eq!(body["indexUid"], json!("studio"));
        assert_eq!(body["highlightPreTag"], json!(HIGHLIGHT_PRE_TAG));
        assert!(body.get("filter").is_none());
        assert!(body.get("sort").is_none());
        assert!(body.get("facets").is_none());
    }
}
