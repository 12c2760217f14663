//! The state machine handling one URL's download.
//!
//! A [`TransferUnit`] streams the response body to disk in
//! [`BLOCK_SIZE`](super::progress) reads and honors pause and stop
//! requests cooperatively at block boundaries. Its lifecycle is
//!
//! ```text
//! Idle -> Connecting -> Streaming -> (Paused <-> Streaming) -> Completed | Failed
//! ```
//!
//! `Completed` and `Failed` are terminal and mutually exclusive. The
//! published progress fraction is monotonically non-decreasing and
//! reaches exactly `1.0` only on success. Exactly one
//! [`StateEvent::UnitFinished`] is emitted per unit.

use super::descriptor::TransferDescriptor;
use super::progress::{ProgressTracker, BLOCK_SIZE};
use crate::events::{CompletionCallback, EventBus, Outcome, StateEvent};
use crate::http::extract_content_length;

use futures::TryStreamExt;
use reqwest_middleware::ClientWithMiddleware;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle phase of a [`TransferUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet admitted by the coordinator.
    Idle,
    /// Request issued, headers not yet received.
    Connecting,
    /// Body is being copied to the destination file.
    Streaming,
    /// Parked at a block boundary, waiting for resume or stop.
    Paused,
    /// Terminal: the whole body was written and the file was closed.
    Completed,
    /// Terminal: the transfer errored or was cancelled.
    Failed,
}

impl Phase {
    /// Whether the phase is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Whether the unit occupies an admission slot. A paused unit still
    /// counts as running.
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Connecting | Phase::Streaming | Phase::Paused)
    }
}

/// Why the streaming loop unwound.
enum TransferFault {
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
struct UnitState {
    phase: Phase,
    // set by pause(), consumed at the next block boundary or voided by
    // a resume; guarded by the same lock as the phase so the two are
    // always observed together
    pause_pending: bool,
    progress: f64,
    bytes_written: u64,
    total_size: Option<u64>,
    status: String,
    error: Option<String>,
}

struct Inner {
    index: usize,
    descriptor: TransferDescriptor,
    client: ClientWithMiddleware,
    events: EventBus,
    on_complete: Option<Arc<CompletionCallback>>,
    state: Mutex<UnitState>,
    resume: Notify,
    cancel: CancellationToken,
}

/// The state machine handling one URL's download.
///
/// Cloning yields another handle to the same unit. All mutators are
/// non-blocking requests; the transfer itself runs as a spawned task.
#[derive(Clone)]
pub struct TransferUnit {
    inner: Arc<Inner>,
}

impl TransferUnit {
    /// Creates an idle unit for `descriptor`. `index` is the unit's
    /// position in descriptor order and is carried on every event.
    pub fn new(
        index: usize,
        descriptor: TransferDescriptor,
        client: ClientWithMiddleware,
        events: EventBus,
        on_complete: Option<Arc<CompletionCallback>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                index,
                descriptor,
                client,
                events,
                on_complete,
                state: Mutex::new(UnitState {
                    phase: Phase::Idle,
                    pause_pending: false,
                    progress: 0.0,
                    bytes_written: 0,
                    total_size: None,
                    status: String::from("queued"),
                    error: None,
                }),
                resume: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// The descriptor this unit was built from.
    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.inner.descriptor
    }

    /// Position of this unit in descriptor order.
    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.state.lock().unwrap().phase
    }

    /// Progress fraction in `[0, 1]`. Non-decreasing; exactly `1.0` only
    /// after a successful completion.
    pub fn progress(&self) -> f64 {
        self.inner.state.lock().unwrap().progress
    }

    /// Bytes written to the destination file so far.
    pub fn bytes_written(&self) -> u64 {
        self.inner.state.lock().unwrap().bytes_written
    }

    /// Expected size from the response headers, once known.
    pub fn total_size(&self) -> Option<u64> {
        self.inner.state.lock().unwrap().total_size
    }

    /// Human-readable status line (bytes done/total, percentage,
    /// throughput, ETA), refreshed at most once per second.
    pub fn status_message(&self) -> String {
        self.inner.state.lock().unwrap().status.clone()
    }

    /// The error message, present iff the unit finished with an error.
    pub fn error_message(&self) -> Option<String> {
        self.inner.state.lock().unwrap().error.clone()
    }

    /// Whether the unit occupies an admission slot (paused included).
    pub fn is_running(&self) -> bool {
        self.phase().is_running()
    }

    /// Whether the unit is parked at a block boundary.
    pub fn is_paused(&self) -> bool {
        self.phase() == Phase::Paused
    }

    /// Whether the unit reached a terminal phase.
    pub fn is_finished(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Starts an idle unit or resumes a paused one.
    ///
    /// From `Idle` this issues the GET request and spawns the streaming
    /// task. From `Paused` it wakes the parked loop. A start on a unit
    /// that is already streaming clears any not-yet-honored pause
    /// request; a start on a finished unit is a no-op.
    pub fn start(&self) {
        let mut state = self.inner.state.lock().unwrap();
        match state.phase {
            Phase::Idle => {
                debug!("Starting {}", self.inner.descriptor.url);
                state.phase = Phase::Connecting;
                state.status = String::from("connecting");
                drop(state);
                self.inner.events.emit(StateEvent::UnitRunning {
                    index: self.inner.index,
                });
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let result = inner.fetch().await;
                    inner.finalize(result);
                });
            }
            Phase::Paused => {
                debug!("Resuming {}", self.inner.descriptor.url);
                state.phase = Phase::Streaming;
                drop(state);
                self.inner.events.emit(StateEvent::UnitPaused {
                    index: self.inner.index,
                    paused: false,
                });
                self.inner.resume.notify_one();
            }
            Phase::Connecting | Phase::Streaming => {
                // a resume can beat the park; the pending pause is void
                state.pause_pending = false;
            }
            Phase::Completed | Phase::Failed => {}
        }
    }

    /// Requests a pause, honored at the next block boundary so a partial
    /// write is never torn. No-op unless the unit is connecting or
    /// streaming.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if matches!(state.phase, Phase::Connecting | Phase::Streaming) {
            state.pause_pending = true;
        }
    }

    /// Requests cancellation of the in-flight transfer. A paused unit is
    /// woken so it can unwind; a finished unit is left alone. Unless the
    /// body had already reached end of stream, the unit settles as
    /// `Failed` with a cancellation error.
    pub fn stop(&self) {
        if self.is_finished() {
            return;
        }
        debug!("Cancelling {}", self.inner.descriptor.url);
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for TransferUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferUnit")
            .field("index", &self.inner.index)
            .field("url", &self.inner.descriptor.url.as_str())
            .field("phase", &self.phase())
            .finish()
    }
}

impl Inner {
    async fn fetch(&self) -> Result<(), TransferFault> {
        let url = &self.descriptor.url;
        debug!("Fetching {}", url);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(TransferFault::Cancelled),
            result = self.client.get(url.clone()).send() => {
                result.map_err(|e| TransferFault::Failed(e.to_string()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferFault::Failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
            )));
        }

        let total = extract_content_length(response.headers());
        debug!("File size: {:?} for {}", total, self.descriptor.relative_path);
        {
            let mut state = self.state.lock().unwrap();
            state.phase = Phase::Streaming;
            state.total_size = total;
        }

        if let Some(parent) = self.descriptor.destination.parent() {
            debug!("Creating destination directory {:?}", parent);
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferFault::Failed(e.to_string()))?;
        }

        debug!("Creating destination file {:?}", self.descriptor.destination);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.descriptor.destination)
            .await
            .map_err(|e| TransferFault::Failed(e.to_string()))?;

        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut tracker = ProgressTracker::new(total);

        loop {
            // a pending pause is honored here, between blocks
            if self.enter_pause() {
                if let Err(fault) = self.wait_for_resume().await {
                    self.close_quietly(file).await;
                    return Err(fault);
                }
            }

            let read = tokio::select! {
                _ = self.cancel.cancelled() => Err(TransferFault::Cancelled),
                result = reader.read(&mut block) => {
                    result.map_err(|e| TransferFault::Failed(e.to_string()))
                }
            };
            let count = match read {
                Ok(count) => count,
                Err(fault) => {
                    self.close_quietly(file).await;
                    return Err(fault);
                }
            };

            if count == 0 {
                debug!("End of stream for {}", self.descriptor.relative_path);
                break;
            }

            if let Err(e) = file.write_all(&block[..count]).await {
                self.close_quietly(file).await;
                return Err(TransferFault::Failed(e.to_string()));
            }

            tracker.record(count);
            self.publish_progress(&mut tracker);
        }

        // a close failure after an otherwise successful transfer loses
        // data, so it demotes the result to an error
        file.flush()
            .await
            .map_err(|e| TransferFault::Failed(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| TransferFault::Failed(e.to_string()))?;

        {
            let mut state = self.state.lock().unwrap();
            state.bytes_written = tracker.bytes_written();
            state.progress = 1.0;
        }
        self.events.emit(StateEvent::UnitProgress {
            index: self.index,
            progress: 1.0,
        });
        Ok(())
    }

    /// Consumes a pending pause at a block boundary. The pending flag
    /// and the phase flip together under the state lock, so a
    /// concurrent resume either voids the pause or observes the unit
    /// as parked; a unit can never park after its pause was voided.
    fn enter_pause(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !state.pause_pending {
                return false;
            }
            state.pause_pending = false;
            state.phase = Phase::Paused;
            state.status = String::from("paused");
        }
        debug!("Paused {}", self.descriptor.relative_path);
        self.events.emit(StateEvent::UnitPaused {
            index: self.index,
            paused: true,
        });
        true
    }

    /// Blocks the streaming loop until resumed or cancelled, without
    /// consuming CPU.
    async fn wait_for_resume(&self) -> Result<(), TransferFault> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TransferFault::Cancelled),
            _ = self.resume.notified() => Ok(()),
        }
    }

    fn publish_progress(&self, tracker: &mut ProgressTracker) {
        let now = Instant::now();
        let notify = tracker.should_notify(now);

        let mut state = self.state.lock().unwrap();
        // the byte counter is always current, only the derived status
        // and progress notifications are throttled
        state.bytes_written = tracker.bytes_written();
        if !notify {
            return;
        }

        state.status = tracker.status_line(now);
        match tracker.fraction() {
            Some(fraction) => {
                // the fraction never regresses
                state.progress = state.progress.max(fraction);
                let progress = state.progress;
                drop(state);
                self.events.emit(StateEvent::UnitProgress {
                    index: self.index,
                    progress,
                });
            }
            // unknown total: progress is only reported at completion
            None => drop(state),
        }
    }

    /// Teardown on the error path must not mask the original failure.
    async fn close_quietly(&self, mut file: File) {
        if let Err(e) = file.flush().await {
            warn!(
                "Error closing {:?}: {}",
                self.descriptor.destination, e
            );
        }
    }

    fn finalize(&self, result: Result<(), TransferFault>) {
        let outcome = match &result {
            Ok(()) => Outcome::Success,
            Err(TransferFault::Cancelled) => Outcome::Cancelled,
            Err(TransferFault::Failed(_)) => Outcome::Failed,
        };

        {
            let mut state = self.state.lock().unwrap();
            match result {
                Ok(()) => {
                    state.phase = Phase::Completed;
                    state.status = String::from("download complete");
                }
                Err(TransferFault::Cancelled) => {
                    debug!("Transfer of {} cancelled", self.descriptor.url);
                    state.phase = Phase::Failed;
                    state.status = String::from("cancelled");
                    state.error = Some(String::from("download cancelled"));
                }
                Err(TransferFault::Failed(message)) => {
                    warn!("Transfer of {} failed: {}", self.descriptor.url, message);
                    state.phase = Phase::Failed;
                    state.status = format!("failed: {message}");
                    state.error = Some(message);
                }
            }
        }

        self.events.emit(StateEvent::UnitFinished {
            index: self.index,
            outcome,
        });
        if let Some(callback) = &self.on_complete {
            callback(&self.descriptor, outcome);
        }
    }
}
