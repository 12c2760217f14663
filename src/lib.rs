//! Barge downloads batches of files over HTTP(S) with bounded concurrency
//! and runtime pause, resume, and stop control.
//!
//! A batch is built from a list of [`transfer::TransferDescriptor`]s, one
//! per URL. Each descriptor becomes a [`transfer::TransferUnit`], a small
//! state machine that streams the response body to disk in 1 MiB blocks
//! and can be paused, resumed, and cancelled at block boundaries. The
//! [`batch::BatchCoordinator`] owns the units, admits them up to a
//! configurable concurrency cap on a fixed tick, and publishes
//! edge-triggered state-change events that a shell or telemetry sink can
//! subscribe to.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use barge::{BatchBuilder, UrlList};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), barge::Error> {
//! let list = UrlList::parse(
//!     "https://example.com/data/file-1.zip\nhttps://example.com/data/file-2.zip",
//!     Path::new("downloads"),
//! );
//! for diagnostic in &list.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//!
//! let coordinator = BatchBuilder::new()
//!     .concurrent_transfers(2)
//!     .build(list.descriptors)?;
//! coordinator.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`transfer`] - The per-URL `TransferUnit` state machine, descriptors,
//!   and progress accounting
//! - [`batch`] - The `BatchCoordinator` and its builder, driving admission
//!   and collective pause/resume/stop on a fixed tick
//! - [`list`] - Preflight parsing of raw URL lists into descriptors
//! - [`events`] - Typed state-change events and the broadcast bus
//! - [`http`] - Shared middleware HTTP client setup
//! - [`error`] - Centralized error handling with the `Error` enum

pub mod batch;
pub mod error;
pub mod events;
pub mod http;
pub mod list;
pub mod transfer;

pub use batch::{BatchBuilder, BatchConfig, BatchCoordinator};
pub use error::{Error, Result};
pub use events::{CompletionCallback, EventBus, Outcome, StateEvent};
pub use http::{create_http_client, extract_content_length, HttpClientConfig};
pub use list::UrlList;
pub use transfer::{Phase, TransferDescriptor, TransferUnit};
