//! Progress, throughput, and ETA accounting for a running transfer.

use indicatif::{HumanBytes, HumanDuration};
use std::time::{Duration, Instant};

/// Size of one read from the response body. A pending pause or stop is
/// honored between blocks, never mid-write, so this also bounds the
/// latency of both requests.
pub(crate) const BLOCK_SIZE: usize = 1024 * 1024;

/// Minimum time between successive progress publications per unit.
pub(crate) const PROGRESS_NOTIFY_DELTA: Duration = Duration::from_secs(1);

/// Largest fraction published while the body is still streaming. The
/// full `1.0` is reserved for successful completion, even when a server
/// sends more bytes than its declared length.
const MAX_STREAMING_FRACTION: f64 = 0.99;

/// Byte counter for one transfer, owned by its streaming loop.
///
/// The tracker throttles publications to [`PROGRESS_NOTIFY_DELTA`] and
/// renders the human-readable status line. Fractions are only available
/// once the expected size is known; an unknown total reports progress
/// only at completion.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    started: Instant,
    last_notified: Instant,
    bytes_written: u64,
    total: Option<u64>,
}

impl ProgressTracker {
    pub(crate) fn new(total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_notified: now,
            bytes_written: 0,
            total,
        }
    }

    pub(crate) fn record(&mut self, bytes: usize) {
        self.bytes_written += bytes as u64;
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// In-flight progress fraction, or `None` while the total is
    /// unknown. Never reaches `1.0`, which is published only on
    /// successful completion.
    pub(crate) fn fraction(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| (self.bytes_written as f64 / total as f64).min(MAX_STREAMING_FRACTION))
    }

    /// Whether enough time has passed since the last publication. On
    /// `true` the throttle window restarts.
    pub(crate) fn should_notify(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_notified) >= PROGRESS_NOTIFY_DELTA {
            self.last_notified = now;
            true
        } else {
            false
        }
    }

    /// Renders bytes done/total, percentage, throughput, and estimated
    /// time remaining.
    pub(crate) fn status_line(&self, now: Instant) -> String {
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.bytes_written as f64 / elapsed
        } else {
            0.0
        };

        match self.total.filter(|total| *total > 0) {
            Some(total) => {
                let percent = 100.0 * self.bytes_written as f64 / total as f64;
                let remaining = total.saturating_sub(self.bytes_written);
                let eta = if rate > 0.0 {
                    Duration::from_secs_f64(remaining as f64 / rate)
                } else {
                    Duration::ZERO
                };
                format!(
                    "{} / {} ({:.0}%), {}/s, ETA {}",
                    HumanBytes(self.bytes_written),
                    HumanBytes(total),
                    percent,
                    HumanBytes(rate as u64),
                    HumanDuration(eta),
                )
            }
            None => format!(
                "{} downloaded, {}/s",
                HumanBytes(self.bytes_written),
                HumanBytes(rate as u64),
            ),
        }
    }
}
