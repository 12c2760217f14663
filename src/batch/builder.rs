//! Builder pattern implementation for creating [`BatchCoordinator`]
//! instances.

use super::{config::BatchConfig, coordinator::BatchCoordinator};
use crate::events::Outcome;
use crate::http::{create_http_client, HttpClientConfig};
use crate::transfer::TransferDescriptor;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use std::sync::Arc;
use std::time::Duration;

/// A builder used to create a [`BatchCoordinator`].
///
/// ```rust
/// # fn main() -> Result<(), barge::Error> {
/// use std::path::Path;
/// use barge::{BatchBuilder, UrlList};
///
/// let list = UrlList::parse("https://example.com/a/file.zip", Path::new("out"));
/// let coordinator = BatchBuilder::new()
///     .concurrent_transfers(4)
///     .build(list.descriptors)?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct BatchBuilder {
    config: BatchConfig,
}

impl BatchBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        BatchBuilder::default()
    }

    /// Sets the maximum number of concurrently active transfers.
    /// Defaults to 1; values below 1 are treated as 1.
    pub fn concurrent_transfers(mut self, concurrent_transfers: usize) -> Self {
        self.config.concurrent_transfers = concurrent_transfers.max(1);
        self
    }

    /// Sets the period of the coordinating tick. Defaults to one second.
    pub fn tick_interval(mut self, tick_interval: Duration) -> Self {
        self.config.tick_interval = tick_interval;
        self
    }

    /// Sets the number of transport-level retries per request. Defaults
    /// to 0.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Sets the proxy used by the shared HTTP client.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Adds http headers sent with every request.
    ///
    /// Can be called multiple times; all maps are merged into one.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.headers = Some(new);
        self
    }

    /// Adds a single http header sent with every request.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();
        new.insert(name, value);

        self.config.headers = Some(new);
        self
    }

    /// Sets the fire-and-forget notification invoked once per transfer
    /// when it reaches a terminal phase, regardless of whether other
    /// transfers are still in progress.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TransferDescriptor, Outcome) + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(callback));
        self
    }

    /// Creates the [`BatchCoordinator`] for `descriptors` with the
    /// specified options, building the shared HTTP client.
    pub fn build(self, descriptors: Vec<TransferDescriptor>) -> crate::Result<BatchCoordinator> {
        let client = create_http_client(HttpClientConfig {
            retries: self.config.retries,
            proxy: self.config.proxy.clone(),
            headers: self.config.headers.clone(),
        })?;
        BatchCoordinator::new(descriptors, client, self.config)
    }
}
