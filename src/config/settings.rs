//! Helper Configuration
//!
//! Defines the configuration schema: where to find the endpoint and key, and
//! the retry settings for each call kind.

use crate::client::{Endpoint, RetryPolicy};
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const DEFAULT_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Full chat-completions URL, including deployment and api-version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Raw API key; prefer `api_key_env`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the endpoint URL
    #[serde(default = "default_endpoint_env")]
    pub endpoint_env: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "RetrySettings::completion")]
    pub completion: RetrySettings,

    #[serde(default = "RetrySettings::streaming")]
    pub streaming: RetrySettings,
}

/// Retry settings for one call kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,

    pub retry_delay_ms: u64,
}

fn default_endpoint_env() -> String {
    DEFAULT_ENDPOINT_ENV.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl RetrySettings {
    pub fn completion() -> Self {
        RetryPolicy::completion().into()
    }

    pub fn streaming() -> Self {
        RetryPolicy::streaming().into()
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

impl From<RetryPolicy> for RetrySettings {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            retry_delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            endpoint_env: default_endpoint_env(),
            api_key_env: default_api_key_env(),
            completion: RetrySettings::completion(),
            streaming: RetrySettings::streaming(),
        }
    }
}

impl HelperConfig {
    /// Resolve the endpoint: explicit values win, then environment variables
    pub fn endpoint(&self) -> Result<Endpoint> {
        let url = resolve(&self.endpoint, &self.endpoint_env)?;
        let api_key = resolve(&self.api_key, &self.api_key_env)?;
        Endpoint::new(&url, &api_key)
    }
}

fn resolve(explicit: &Option<String>, env: &str) -> Result<String> {
    if let Some(value) = explicit {
        return Ok(value.clone());
    }
    std::env::var(env).map_err(|_| {
        ChatError::Config(format!("Set {} or add it to the config file", env))
    })
}
