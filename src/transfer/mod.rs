//! Per-URL transfer functionality.
//!
//! This module contains the [`TransferUnit`] state machine that handles a
//! single download, the immutable [`TransferDescriptor`] it is built
//! from, and the progress accounting shared by both.
//!
//! A unit is normally owned by a [`crate::batch::BatchCoordinator`], but
//! it can also be driven directly:
//!
//! ```no_run
//! use std::path::PathBuf;
//! use barge::{create_http_client, EventBus, HttpClientConfig};
//! use barge::transfer::{TransferDescriptor, TransferUnit};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), barge::Error> {
//! let descriptor = TransferDescriptor::new(
//!     "https://example.com/data/file.zip".parse().map_err(|e| {
//!         barge::Error::InvalidUrl(format!("{e}"))
//!     })?,
//!     PathBuf::from("downloads/data/file.zip"),
//!     "data/file.zip",
//! );
//! let client = create_http_client(HttpClientConfig::default())?;
//! let unit = TransferUnit::new(0, descriptor, client, EventBus::default(), None);
//! unit.start();
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod progress;
pub mod unit;

pub use descriptor::TransferDescriptor;
pub use unit::{Phase, TransferUnit};
