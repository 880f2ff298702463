//! This module provides a retryable HTTP client for HTTP-based mail relays.

mod client;

pub use client::{HttpClientError, build_http_client, create_retryable_http_client};
