//! Client Module
//!
//! Single-attempt HTTP calls, the retry control around them, and the
//! streaming producer/consumer pair.

pub mod http;
pub mod retry;
pub mod stream;

pub use http::{Endpoint, HttpClient};
pub use retry::RetryPolicy;
pub use stream::{FragmentStream, StreamSignal};
