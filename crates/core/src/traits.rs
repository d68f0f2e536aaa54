use async_trait::async_trait;

use crate::error::{ConnectionError, SearchError};
use crate::models::{ConnectionDetails, FacetSearchRequest, FacetSearchResponse, QueryResponse};
use crate::query::QueryDescriptor;

/// Narrow contract over the search service. Element N of the response
/// corresponds to query N of the batch.
#[async_trait]
pub trait SearchBackend {
    async fn multi_search(
        &self,
        queries: &[QueryDescriptor],
    ) -> Result<Vec<QueryResponse>, SearchError>;

    async fn facet_search(
        &self,
        request: &FacetSearchRequest,
    ) -> Result<FacetSearchResponse, SearchError>;
}

/// Yields the endpoint, index identifier, and scoped access token used to
/// construct a search client for the current user.
#[async_trait]
pub trait ConnectionSource {
    async fn fetch_connection(&self) -> Result<ConnectionDetails, ConnectionError>;
}
