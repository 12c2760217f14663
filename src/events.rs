//! Typed state-change events and the broadcast bus they travel on.
//!
//! Units and the coordinator publish [`StateEvent`]s on an [`EventBus`];
//! a GUI shell or telemetry sink subscribes with [`EventBus::subscribe`].
//! Emission is edge-triggered: an event is only published when the value
//! it describes actually changed, so subscribers never see level noise.
//! Delivery is fire-and-forget; a bus with no subscribers drops events
//! silently.

use crate::transfer::TransferDescriptor;

use std::sync::Arc;
use tokio::sync::broadcast;

/// Terminal outcome of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The whole body was written to the destination file.
    Success,
    /// A network, protocol, or filesystem error ended the transfer.
    Failed,
    /// The transfer was stopped before reaching end of stream.
    Cancelled,
}

/// A state change of a single transfer or of the whole batch.
///
/// Unit-level variants carry the index of the unit in descriptor order.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// A unit left `Idle` and issued its request.
    UnitRunning { index: usize },
    /// A unit parked at a block boundary (`paused: true`) or resumed.
    UnitPaused { index: usize, paused: bool },
    /// A unit's progress fraction advanced. Throttled to at most one
    /// event per second per unit, except the final `1.0`.
    UnitProgress { index: usize, progress: f64 },
    /// A unit reached a terminal phase. Emitted exactly once per unit.
    UnitFinished { index: usize, outcome: Outcome },
    /// The batch started (`true`) or stopped running (`false`).
    BatchRunning(bool),
    /// Every active transfer is parked (`true`), or the batch resumed.
    BatchPaused(bool),
    /// Every unit reached a terminal phase, or a stop drained the batch.
    BatchFinished,
}

/// Fire-and-forget notification invoked once per unit when it reaches a
/// terminal phase, carrying the descriptor and the outcome. This is the
/// seam for an external telemetry sink.
pub type CompletionCallback = dyn Fn(&TransferDescriptor, Outcome) + Send + Sync;

/// Broadcast channel for [`StateEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<StateEvent>>,
}

impl EventBus {
    /// Creates a bus retaining up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Opens a new subscription. Events emitted before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: StateEvent) {
        // A send error only means there is no subscriber right now.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
