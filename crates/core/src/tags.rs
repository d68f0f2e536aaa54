use std::collections::BTreeSet;

use crate::error::SearchError;
use crate::filter_expr::{serialize_filter, FilterExpr};
use crate::models::{
    FacetSearchRequest, ResultHit, TagEntry, FACET_CAP, MAX_TAG_DEPTH, TAG_KEYWORD_DOC_CAP,
    TAG_SEP, TAXONOMY_FACET,
};
use crate::query::QueryDescriptor;
use crate::traits::SearchBackend;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagOptions {
    pub tags: Vec<TagEntry>,
    /// True when the facet query hit the backend's per-facet cap: the
    /// option list is known-incomplete.
    pub may_be_missing_results: bool,
}

/// Facet attribute holding the direct children of a parent path with
/// `parent_segments` segments. `None` past the deepest supported level.
fn facet_for_children(parent_segments: usize) -> Option<String> {
    match parent_segments {
        0 => Some(TAXONOMY_FACET.to_string()),
        n if n <= MAX_TAG_DEPTH => Some(format!("tags.level{}", n - 1)),
        _ => None,
    }
}

/// Facet attribute a full path of `segments` segments lives in.
fn facet_for_path(segments: usize) -> Option<String> {
    match segments {
        0 => None,
        1 => Some(TAXONOMY_FACET.to_string()),
        n if n <= MAX_TAG_DEPTH + 1 => Some(format!("tags.level{}", n - 2)),
        _ => None,
    }
}

/// The facet query is fuzzy-prefix, so a value only counts as a child when
/// its lineage exactly matches the parent.
fn is_child_of(value: &str, parent: &str) -> bool {
    value
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix(TAG_SEP))
        .is_some_and(|leaf| !leaf.is_empty() && !leaf.contains(TAG_SEP))
}

/// Computes the selectable child tags beneath `parent_tag_path` (taxonomy
/// roots when absent), their counts, and whether each has further
/// children. The child-detection facet query runs concurrently with the
/// primary one; results are joined only once both are needed.
pub async fn fetch_tag_options<B: SearchBackend + Sync>(
    backend: &B,
    index_uid: &str,
    filter: &[FilterExpr],
    parent_tag_path: Option<&str>,
) -> Result<TagOptions, SearchError> {
    let parent_segments = parent_tag_path
        .map(|parent| parent.split(TAG_SEP).count())
        .unwrap_or(0);
    let Some(facet_name) = facet_for_children(parent_segments) else {
        return Ok(TagOptions::default());
    };

    let mut groups = filter.to_vec();
    if let Some(parent) = parent_tag_path {
        if let Some(parent_attr) = facet_for_path(parent_segments) {
            groups.push(FilterExpr::eq(parent_attr, parent));
        }
    }
    let filter_value = serialize_filter(&groups);

    let primary_request = FacetSearchRequest {
        index_uid: index_uid.to_string(),
        facet_name,
        facet_query: parent_tag_path.map(str::to_string),
        q: None,
        filter: filter_value.clone(),
    };

    // Roots always have children (a taxonomy root cannot be a leaf), so
    // the speculative child query only runs beneath a parent.
    let child_request = parent_tag_path
        .and_then(|_| facet_for_children(parent_segments + 1))
        .map(|child_facet| FacetSearchRequest {
            index_uid: index_uid.to_string(),
            facet_name: child_facet,
            facet_query: parent_tag_path.map(str::to_string),
            q: None,
            filter: filter_value,
        });

    let (primary, children) = tokio::try_join!(backend.facet_search(&primary_request), async {
        match &child_request {
            Some(request) => backend.facet_search(request).await.map(Some),
            None => Ok(None),
        }
    })?;

    let child_cap_hit = children
        .as_ref()
        .is_some_and(|response| response.facet_hits.len() >= FACET_CAP);
    let child_lineages: BTreeSet<String> = children
        .as_ref()
        .map(|response| {
            response
                .facet_hits
                .iter()
                .filter_map(|hit| hit.value.rsplit_once(TAG_SEP))
                .map(|(lineage, _)| lineage.to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut tags = Vec::new();
    for facet_hit in &primary.facet_hits {
        let tag_path = facet_hit.value.clone();
        let tag_name = match parent_tag_path {
            Some(parent) => {
                if !is_child_of(&tag_path, parent) {
                    continue;
                }
                tag_path[parent.len() + TAG_SEP.len()..].to_string()
            }
            None => tag_path.clone(),
        };

        let has_children = parent_tag_path.is_none()
            || child_cap_hit
            || child_lineages.contains(&tag_path);

        tags.push(TagEntry {
            tag_name,
            tag_path,
            tag_count: facet_hit.count,
            has_children,
        });
    }

    Ok(TagOptions {
        tags,
        may_be_missing_results: primary.facet_hits.len() >= FACET_CAP,
    })
}

/// Best-effort keyword match across tag attributes: one bounded search
/// collecting every case-insensitive substring match over matched
/// documents' tag lists. Incomplete when more than the cap's worth of
/// documents share the matching tags.
pub async fn fetch_tags_matching_keyword<B: SearchBackend + Sync>(
    backend: &B,
    index_uid: &str,
    filter: &[FilterExpr],
    keywords: &str,
) -> Result<BTreeSet<String>, SearchError> {
    let keywords = keywords.trim();
    if keywords.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mut query = QueryDescriptor::new(index_uid);
    query.q = keywords.to_string();
    query.filter = serialize_filter(filter);
    query.limit = TAG_KEYWORD_DOC_CAP;
    query.attributes_to_search_on = Some(
        std::iter::once(TAXONOMY_FACET.to_string())
            .chain((0..MAX_TAG_DEPTH).map(|level| format!("tags.level{level}")))
            .collect(),
    );
    query.attributes_to_retrieve = Some(vec!["tags".to_string()]);

    let responses = backend.multi_search(&[query]).await?;
    let Some(response) = responses.into_iter().next() else {
        return Ok(BTreeSet::new());
    };

    let needle = keywords.to_lowercase();
    let mut matches = BTreeSet::new();
    for hit in &response.hits {
        if let ResultHit::Content(content) = hit {
            for tag_path in content.tags.all_paths() {
                if tag_path.to_lowercase().contains(&needle) {
                    matches.insert(tag_path.to_string());
                }
            }
        }
    }

    Ok(matches)
}

/// Intersects tag options with a keyword-match set: a tag survives when
/// its path is in the set or is an ancestor of a member of the set.
/// `None` means no keyword search is active and everything survives.
pub fn filter_by_keyword_matches(
    options: TagOptions,
    matches: Option<&BTreeSet<String>>,
) -> TagOptions {
    let Some(matches) = matches else {
        return options;
    };

    let tags = options
        .tags
        .into_iter()
        .filter(|tag| {
            let descendant_prefix = format!("{}{}", tag.tag_path, TAG_SEP);
            matches
                .iter()
                .any(|path| path == &tag.tag_path || path.starts_with(&descendant_prefix))
        })
        .collect();

    TagOptions {
        tags,
        may_be_missing_results: options.may_be_missing_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::models::{ContentHit, FacetHit, FacetSearchResponse, QueryResponse, TagRollup};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Facet responses keyed by facet name; multi-search responses drain in
    /// call order.
    #[derive(Default)]
    struct FakeBackend {
        facets: HashMap<String, FacetSearchResponse>,
        searches: Mutex<Vec<Vec<QueryResponse>>>,
        facet_calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_facet(mut self, facet_name: &str, values: &[(&str, u64)]) -> Self {
            self.facets.insert(
                facet_name.to_string(),
                FacetSearchResponse {
                    facet_hits: values
                        .iter()
                        .map(|(value, count)| FacetHit {
                            value: value.to_string(),
                            count: *count,
                        })
                        .collect(),
                },
            );
            self
        }

        fn with_search(self, responses: Vec<QueryResponse>) -> Self {
            self.searches.lock().unwrap().push(responses);
            self
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn multi_search(
            &self,
            _queries: &[QueryDescriptor],
        ) -> Result<Vec<QueryResponse>, SearchError> {
            let mut searches = self.searches.lock().unwrap();
            if searches.is_empty() {
                return Err(SearchError::Request("no queued response".to_string()));
            }
            Ok(searches.remove(0))
        }

        async fn facet_search(
            &self,
            request: &FacetSearchRequest,
        ) -> Result<FacetSearchResponse, SearchError> {
            self.facet_calls
                .lock()
                .unwrap()
                .push(request.facet_name.clone());
            Ok(self
                .facets
                .get(&request.facet_name)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn tagged_hit(paths: &[&str]) -> ResultHit {
        ResultHit::Content(ContentHit {
            id: "hit".to_string(),
            tags: TagRollup {
                level0: paths.iter().map(|path| path.to_string()).collect(),
                ..TagRollup::default()
            },
            ..ContentHit::default()
        })
    }

    #[tokio::test]
    async fn fuzzy_prefix_results_are_post_filtered_to_exact_lineage() {
        let backend = FakeBackend::default().with_facet(
            "tags.level0",
            &[("Places > North America", 5), ("Places2 > Foo", 3)],
        );

        let options = fetch_tag_options(&backend, "studio", &[], Some("Places"))
            .await
            .unwrap();

        assert_eq!(options.tags.len(), 1);
        assert_eq!(options.tags[0].tag_path, "Places > North America");
        assert_eq!(options.tags[0].tag_name, "North America");
        assert_eq!(options.tags[0].tag_count, 5);
    }

    #[tokio::test]
    async fn root_level_tags_always_have_children() {
        let backend = FakeBackend::default()
            .with_facet("tags.taxonomy", &[("Places", 12), ("Subject", 40)]);

        let options = fetch_tag_options(&backend, "studio", &[], None)
            .await
            .unwrap();

        assert_eq!(options.tags.len(), 2);
        assert!(options.tags.iter().all(|tag| tag.has_children));
        // No speculative child query for roots.
        assert_eq!(*backend.facet_calls.lock().unwrap(), vec!["tags.taxonomy"]);
    }

    #[tokio::test]
    async fn children_are_detected_by_stripping_the_leaf_segment() {
        let backend = FakeBackend::default()
            .with_facet(
                "tags.level0",
                &[("Places > North America", 5), ("Places > Europe", 2)],
            )
            .with_facet("tags.level1", &[("Places > North America > Canada", 1)]);

        let options = fetch_tag_options(&backend, "studio", &[], Some("Places"))
            .await
            .unwrap();

        let by_path: HashMap<&str, bool> = options
            .tags
            .iter()
            .map(|tag| (tag.tag_path.as_str(), tag.has_children))
            .collect();
        assert_eq!(by_path["Places > North America"], true);
        assert_eq!(by_path["Places > Europe"], false);
        assert_eq!(
            *backend.facet_calls.lock().unwrap(),
            vec!["tags.level0", "tags.level1"]
        );
    }

    #[tokio::test]
    async fn child_facet_at_cap_marks_every_tag_as_parent() {
        let many: Vec<(String, u64)> = (0..FACET_CAP)
            .map(|index| (format!("Places > Europe > Region {index}"), 1))
            .collect();
        let many_refs: Vec<(&str, u64)> = many
            .iter()
            .map(|(value, count)| (value.as_str(), *count))
            .collect();

        let backend = FakeBackend::default()
            .with_facet(
                "tags.level0",
                &[("Places > North America", 5), ("Places > Europe", 2)],
            )
            .with_facet("tags.level1", &many_refs);

        let options = fetch_tag_options(&backend, "studio", &[], Some("Places"))
            .await
            .unwrap();

        assert!(
            options.tags.iter().all(|tag| tag.has_children),
            "cap hit must mark all tags conservatively"
        );
    }

    #[tokio::test]
    async fn primary_facet_at_cap_flags_missing_results() {
        let many: Vec<(String, u64)> = (0..FACET_CAP)
            .map(|index| (format!("Taxonomy {index}"), 1))
            .collect();
        let many_refs: Vec<(&str, u64)> = many
            .iter()
            .map(|(value, count)| (value.as_str(), *count))
            .collect();
        let backend = FakeBackend::default().with_facet("tags.taxonomy", &many_refs);

        let options = fetch_tag_options(&backend, "studio", &[], None)
            .await
            .unwrap();

        assert!(options.may_be_missing_results);
    }

    #[tokio::test]
    async fn deeper_than_max_depth_yields_no_options() {
        let backend = FakeBackend::default();
        let options = fetch_tag_options(
            &backend,
            "studio",
            &[],
            Some("A > B > C > D > E"),
        )
        .await
        .unwrap();
        assert_eq!(options, TagOptions::default());
        assert!(backend.facet_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn keyword_match_collects_distinct_paths_case_insensitively() {
        let backend = FakeBackend::default().with_search(vec![QueryResponse {
            hits: vec![
                tagged_hit(&["Places > North America", "Subject > Math"]),
                tagged_hit(&["Places > North America", "Places > Europe"]),
            ],
            total_hits: 2,
            facet_distribution: None,
        }]);

        let matches = fetch_tags_matching_keyword(&backend, "studio", &[], "north")
            .await
            .unwrap();

        assert_eq!(
            matches.into_iter().collect::<Vec<_>>(),
            vec!["Places > North America".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_keyword_skips_the_search() {
        let backend = FakeBackend::default();
        let matches = fetch_tags_matching_keyword(&backend, "studio", &[], "  ")
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn keyword_intersection_keeps_matches_and_their_ancestors() {
        let options = TagOptions {
            tags: vec![
                TagEntry {
                    tag_name: "Places".to_string(),
                    tag_path: "Places".to_string(),
                    tag_count: 3,
                    has_children: true,
                },
                TagEntry {
                    tag_name: "Subject".to_string(),
                    tag_path: "Subject".to_string(),
                    tag_count: 9,
                    has_children: true,
                },
            ],
            may_be_missing_results: false,
        };

        let matches: BTreeSet<String> =
            std::iter::once("Places > North America".to_string()).collect();
        let filtered = filter_by_keyword_matches(options.clone(), Some(&matches));
        assert_eq!(filtered.tags.len(), 1);
        assert_eq!(filtered.tags[0].tag_path, "Places");

        let unfiltered = filter_by_keyword_matches(options, None);
        assert_eq!(unfiltered.tags.len(), 2);
    }
}
