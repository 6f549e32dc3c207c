//! Remote object-server transport over HTTP.
//!
//! Speaks a minimal content-addressed REST surface: `PUT /objects/{id}` to
//! store, `GET` to fetch, `HEAD` to probe. Commit metadata and the rest of
//! the server API are out of scope here (see `stream`).

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::ObjectId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub struct ServerTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ServerTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                TransportError::RequestFailed(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn object_url(&self, id: &ObjectId) -> String {
        format!("{}/objects/{}", self.base_url, id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl Transport for ServerTransport {
    fn name(&self) -> &str {
        "server"
    }

    async fn save(&self, id: &ObjectId, payload: &[u8]) -> Result<(), TransportError> {
        let response = self
            .authorize(self.client.put(self.object_url(id)))
            .body(payload.to_vec())
            .send()
            .await
            .map_err(map_http_error)?;
        response.error_for_status().map_err(map_http_error)?;
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, TransportError> {
        let response = self
            .authorize(self.client.get(self.object_url(id)))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(map_http_error)?;
        let bytes = response.bytes().await.map_err(map_http_error)?;
        Ok(Some(bytes.to_vec()))
    }

    async fn has(&self, id: &ObjectId) -> Result<bool, TransportError> {
        let response = self
            .authorize(self.client.head(self.object_url(id)))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response.error_for_status().map_err(map_http_error)?;
        Ok(true)
    }
}

fn map_http_error(error: reqwest::Error) -> TransportError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 | 403 => TransportError::AuthFailed(format!("authentication failed: {error}")),
            429 => TransportError::RateLimited(format!("rate limit exceeded: {error}")),
            _ => TransportError::RequestFailed(format!(
                "request failed with status {status}: {error}"
            )),
        }
    } else if error.is_timeout() {
        TransportError::RequestFailed(format!("request timeout: {error}"))
    } else if error.is_connect() {
        TransportError::RequestFailed(format!("connection error: {error}"))
    } else {
        TransportError::RequestFailed(format!("HTTP error: {error}"))
    }
}
