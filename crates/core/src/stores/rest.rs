use async_trait::async_trait;
use reqwest::Client;

use crate::error::ConnectionError;
use crate::models::ConnectionDetails;
use crate::traits::ConnectionSource;

/// Fetches connection details from the platform's REST endpoint, which
/// scopes the returned API key to the current user's permissions.
pub struct RestConnectionSource {
    client: Client,
    endpoint: String,
}

impl RestConnectionSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ConnectionSource for RestConnectionSource {
    async fn fetch_connection(&self) -> Result<ConnectionDetails, ConnectionError> {
        let response = self.client.get(&self.endpoint).send().await?;

        if !response.status().is_success() {
            return Err(ConnectionError::Status(response.status()));
        }

        let details: ConnectionDetails = response.json().await?;
        if details.url.is_empty() || details.index_name.is_empty() {
            return Err(ConnectionError::BadResponse(
                "missing url or indexName".to_string(),
            ));
        }

        Ok(details)
    }
}

/// Fixed connection details, for callers that already hold an endpoint and
/// key instead of going through the details endpoint.
pub struct StaticConnectionSource {
    details: ConnectionDetails,
}

impl StaticConnectionSource {
    pub fn new(details: ConnectionDetails) -> Self {
        Self { details }
    }
}

#[async_trait]
impl ConnectionSource for StaticConnectionSource {
    async fn fetch_connection(&self) -> Result<ConnectionDetails, ConnectionError> {
        Ok(self.details.clone())
    }
}
