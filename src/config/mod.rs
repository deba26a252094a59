//! Configuration Module
//!
//! Handles helper configuration loading and endpoint resolution.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{HelperConfig, RetrySettings, DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT_ENV};
