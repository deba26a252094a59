//! HTTP Client
//!
//! Single-attempt POST against a chat-completion endpoint. Retrying is the
//! caller's job (see [`crate::client::retry`]).

use crate::error::{truncate, ChatError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

const API_KEY_HEADER: &str = "api-key";

/// A validated endpoint URL and API key
#[derive(Clone)]
pub struct Endpoint {
    url: Url,
    api_key: HeaderValue,
}

impl Endpoint {
    /// Validate the URL and key up front so no attempt fails on bad input
    pub fn new(url: &str, api_key: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| ChatError::Config(format!("Invalid endpoint URL '{}': {}", url, e)))?;

        let mut api_key = HeaderValue::from_str(api_key)
            .map_err(|e| ChatError::Config(format!("Invalid API key format: {}", e)))?;
        api_key.set_sensitive(true);

        Ok(Self { url, api_key })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(API_KEY_HEADER), self.api_key.clone());
        headers
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Owns one `reqwest::Client` for the lifetime of a single call
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client with no request timeout
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ChatError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// POST `body` and wait for the response headers; non-2xx is an error
    async fn send(&self, endpoint: &Endpoint, body: &str) -> Result<Response> {
        let response = self
            .client
            .post(endpoint.url.clone())
            .headers(endpoint.headers())
            .body(body.to_owned())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::status(status.as_u16(), &body));
        }

        Ok(response)
    }

    /// One attempt: POST, read the full body, decode it as `R`
    pub async fn post_json<R>(&self, endpoint: &Endpoint, body: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self.send(endpoint, body).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            ChatError::Response(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                truncate(&text, 500)
            ))
        })
    }

    /// One attempt: POST and return as soon as headers arrive; the body is
    /// left unread for incremental consumption
    pub async fn post_stream(&self, endpoint: &Endpoint, body: &str) -> Result<Response> {
        self.send(endpoint, body).await
    }
}
