//! Configuration structure and defaults for the batch coordinator.

use crate::events::CompletionCallback;

use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`crate::batch::BatchCoordinator`].
#[derive(Clone)]
pub struct BatchConfig {
    /// Maximum number of concurrently active transfers.
    pub concurrent_transfers: usize,
    /// Period of the coordinating tick.
    pub tick_interval: Duration,
    /// Transport-level retries handed to the HTTP client middleware.
    pub retries: u32,
    /// Custom HTTP headers.
    pub headers: Option<HeaderMap>,
    /// Optional proxy configuration.
    pub proxy: Option<reqwest::Proxy>,
    /// Fire-and-forget notification per finished transfer.
    pub on_complete: Option<Arc<CompletionCallback>>,
}

impl std::fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConfig")
            .field("concurrent_transfers", &self.concurrent_transfers)
            .field("tick_interval", &self.tick_interval)
            .field("retries", &self.retries)
            .field("headers", &self.headers)
            .field("proxy", &self.proxy.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrent_transfers: 1,
            tick_interval: Duration::from_secs(1),
            retries: 0,
            headers: None,
            proxy: None,
            on_complete: None,
        }
    }
}
