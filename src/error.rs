//! Error handling for the barge library.
//!
//! This module provides centralized error handling for batch construction
//! and control. Failures of an individual transfer never surface here:
//! they are captured on the affected [`crate::transfer::TransferUnit`] as
//! its error message, so one bad URL cannot take the batch down.

use std::io;
use thiserror::Error;

/// Errors that can happen when using barge.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the underlying URL parser or the expected URL format.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A coordinator operation was called in a phase that forbids it,
    /// e.g. `stop()` before the batch was started or `pause()` while it
    /// is already paused. These indicate a caller bug, not a transient
    /// condition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library.
    #[error("Reqwest Error")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
}

/// Result type alias for operations that can fail with a barge error.
pub type Result<T> = std::result::Result<T, Error>;
