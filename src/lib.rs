//! Azure OpenAI Helper
//!
//! Chat-completion calls against an Azure OpenAI style endpoint: a buffered
//! call with fixed-delay retry, and a streamed call whose SSE body is turned
//! into a lazy sequence of text fragments.
//!
//! ```no_run
//! use azure_openai_helper::{ChatClient, ChatMessage, ChatRequest, ChatResponse};
//! use futures::StreamExt;
//!
//! # async fn demo() -> azure_openai_helper::Result<()> {
//! let client = ChatClient::from_loader()?;
//! let request = ChatRequest::new(vec![ChatMessage::user("Hello")]);
//!
//! let reply: Option<ChatResponse> = client.complete_default(&request).await;
//!
//! let mut fragments = client.stream_default(&request.with_stream(true));
//! while let Some(fragment) = fragments.next().await {
//!     print!("{}", fragment?);
//! }
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use api::{ChatMessage, ChatRequest, ChatResponse};
pub use client::{Endpoint, FragmentStream, RetryPolicy, StreamSignal};
pub use config::{ConfigLoader, HelperConfig, RetrySettings};
pub use error::{ChatError, Result};
pub use logging::{LogSink, MemorySink, TracingSink};

use client::retry::log_completion_failure;
use client::stream::Producer;
use client::HttpClient;

/// The chat-completion client.
///
/// Holds no connection state; every call builds and drops its own HTTP
/// client.
pub struct ChatClient {
    /// Retry settings and endpoint lookup
    config: HelperConfig,

    /// Receives retry and failure messages
    sink: Arc<dyn LogSink>,
}

impl ChatClient {
    /// Create a client with default settings, logging through `tracing`
    pub fn new() -> Self {
        Self::from_config(HelperConfig::default())
    }

    /// Create a client from `.env` and the default config file locations
    pub fn from_loader() -> Result<Self> {
        let loader = ConfigLoader::new()?;
        Ok(Self::from_config(loader.into_config()))
    }

    /// Create a client from a config object
    pub fn from_config(config: HelperConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the log sink
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Send `request` and decode the reply, retrying every failure.
    ///
    /// Returns `None` once `policy.max_attempts` attempts have failed; the
    /// failures go to the log sink, never to the caller.
    pub async fn complete<Req, Resp>(
        &self,
        endpoint: &Endpoint,
        request: &Req,
        policy: RetryPolicy,
    ) -> Option<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let sink = self.sink.as_ref();

        let body = match serde_json::to_string(request) {
            Ok(body) => body,
            Err(e) => {
                sink.log(
                    Level::ERROR,
                    &format!("Failed to serialize request for {}: {}", endpoint.url(), e),
                );
                return None;
            }
        };

        let client = match HttpClient::new() {
            Ok(client) => client,
            Err(e) => {
                sink.log(Level::ERROR, &e.to_string());
                return None;
            }
        };

        let result = policy
            .run(
                |_| client.post_json::<Resp>(endpoint, &body),
                |n, err| log_completion_failure(sink, n, policy.max_attempts, err),
            )
            .await;

        match result {
            Ok(response) => Some(response),
            Err(ChatError::Exhausted {
                last: Some(last), ..
            }) => {
                sink.log(
                    Level::ERROR,
                    &format!(
                        "All retries failed for request to {}. Last error: {}",
                        endpoint.url(),
                        last
                    ),
                );
                None
            }
            Err(_) => {
                sink.log(
                    Level::ERROR,
                    &format!("All retries failed for request to {}", endpoint.url()),
                );
                None
            }
        }
    }

    /// [`complete`](Self::complete) against the configured endpoint and
    /// completion retry settings
    pub async fn complete_default<Req, Resp>(&self, request: &Req) -> Option<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let endpoint = match self.config.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.sink.log(Level::ERROR, &e.to_string());
                return None;
            }
        };

        self.complete(&endpoint, request, self.config.completion.policy())
            .await
    }

    /// Prepare a streamed completion.
    ///
    /// Nothing is sent until the returned stream is first polled, which must
    /// happen inside a tokio runtime. Only connection attempts are retried; a
    /// failure after the body starts arriving ends the stream with an `Err`.
    /// Exhausted attempts yield an empty stream.
    pub fn stream<Req>(
        &self,
        endpoint: &Endpoint,
        request: &Req,
        policy: RetryPolicy,
    ) -> FragmentStream
    where
        Req: Serialize + ?Sized,
    {
        FragmentStream::lazy(Producer {
            endpoint: endpoint.clone(),
            body: serde_json::to_string(request).map_err(ChatError::from),
            policy,
            sink: self.sink.clone(),
        })
    }

    /// [`stream`](Self::stream) against the configured endpoint and
    /// streaming retry settings
    pub fn stream_default<Req>(&self, request: &Req) -> FragmentStream
    where
        Req: Serialize + ?Sized,
    {
        match self.config.endpoint() {
            Ok(endpoint) => self.stream(&endpoint, request, self.config.streaming.policy()),
            Err(e) => {
                self.sink.log(Level::ERROR, &e.to_string());
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(StreamSignal::Failed(e));
                FragmentStream::new(rx)
            }
        }
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}
