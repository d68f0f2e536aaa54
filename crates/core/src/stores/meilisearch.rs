use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::SearchError;
use crate::models::{
    ConnectionDetails, FacetHit, FacetSearchRequest, FacetSearchResponse, QueryResponse, ResultHit,
};
use crate::query::QueryDescriptor;
use crate::traits::SearchBackend;

pub struct MeilisearchStore {
    client: Arc<Client>,
    endpoint: String,
    api_key: Option<String>,
}

impl MeilisearchStore {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn from_connection(details: &ConnectionDetails) -> Self {
        let api_key = if details.api_key.is_empty() {
            None
        } else {
            Some(details.api_key.clone())
        };
        Self::new(details.url.clone(), api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.endpoint, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl SearchBackend for MeilisearchStore {
    async fn multi_search(
        &self,
        queries: &[QueryDescriptor],
    ) -> Result<Vec<QueryResponse>, SearchError> {
        let response = self
            .post("/multi-search")
            .json(&json!({ "queries": queries }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "meilisearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let results = parsed
            .pointer("/results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        results.into_iter().map(parse_query_response).collect()
    }

    async fn facet_search(
        &self,
        request: &FacetSearchRequest,
    ) -> Result<FacetSearchResponse, SearchError> {
        let response = self
            .post(&format!("/indexes/{}/facet-search", request.index_uid))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "meilisearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let facet_hits = parsed
            .pointer("/facetHits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| {
                let value = hit.pointer("/value")?.as_str()?.to_string();
                let count = hit.pointer("/count").and_then(Value::as_u64).unwrap_or(0);
                Some(FacetHit { value, count })
            })
            .collect();

        Ok(FacetSearchResponse { facet_hits })
    }
}

fn parse_query_response(value: Value) -> Result<QueryResponse, SearchError> {
    let total_hits = value
        .pointer("/totalHits")
        .and_then(Value::as_u64)
        .or_else(|| value.pointer("/estimatedTotalHits").and_then(Value::as_u64))
        .unwrap_or(0) as usize;

    let hits = value
        .pointer("/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(ResultHit::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    let facet_distribution = value
        .pointer("/facetDistribution")
        .cloned()
        .map(|distribution| {
            serde_json::from_value::<BTreeMap<String, BTreeMap<String, u64>>>(distribution)
                .unwrap_or_default()
        });

    Ok(QueryResponse {
        hits,
        total_hits,
        facet_distribution,
    })
}
