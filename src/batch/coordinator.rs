//! The coordinator managing a set of transfers as one batch.
//!
//! All collective behavior is driven by a fixed-period tick owned by a
//! spawned task. Each tick walks the units in descriptor order with the
//! precedence stop > pause > admit > resume, then resolves the aggregate
//! `running`/`paused`/`finished` flags. Aggregate transitions are only
//! decided inside the tick, under the single coordinator lock, and are
//! published edge-triggered.

use super::config::BatchConfig;
use crate::error::Error;
use crate::events::{EventBus, StateEvent};
use crate::transfer::{Phase, TransferDescriptor, TransferUnit};

use reqwest_middleware::ClientWithMiddleware;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Per-unit admission bookkeeping. Only admissions count against the
/// concurrency cap; a resume is not a new admission.
#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    admitted: bool,
    released: bool,
}

#[derive(Debug)]
struct CoordState {
    units: Vec<TransferUnit>,
    slots: Vec<Slot>,
    active: usize,
    running: bool,
    paused: bool,
    finished: bool,
    should_stop: bool,
    should_pause: bool,
    should_resume: bool,
}

struct Inner {
    config: BatchConfig,
    events: EventBus,
    state: Mutex<CoordState>,
}

/// Manages a set of [`TransferUnit`]s as one job.
///
/// A coordinator is created once per batch, started, optionally paused
/// and resumed any number of times, and stopped at most once. It
/// finishes automatically when every unit reaches a terminal phase and
/// cannot be restarted afterwards; a new batch needs a fresh
/// coordinator.
#[derive(Clone)]
pub struct BatchCoordinator {
    inner: Arc<Inner>,
}

impl BatchCoordinator {
    pub(crate) fn new(
        descriptors: Vec<TransferDescriptor>,
        client: ClientWithMiddleware,
        config: BatchConfig,
    ) -> crate::Result<Self> {
        if descriptors.is_empty() {
            return Err(Error::InvalidState(
                "a batch needs at least one transfer descriptor".into(),
            ));
        }

        let events = EventBus::default();
        let units: Vec<TransferUnit> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                TransferUnit::new(
                    index,
                    descriptor,
                    client.clone(),
                    events.clone(),
                    config.on_complete.clone(),
                )
            })
            .collect();
        let slots = vec![Slot::default(); units.len()];

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                events,
                state: Mutex::new(CoordState {
                    units,
                    slots,
                    active: 0,
                    running: false,
                    paused: false,
                    finished: false,
                    should_stop: false,
                    should_pause: false,
                    should_resume: false,
                }),
            }),
        })
    }

    /// Whether the batch is between its start and its terminal state.
    pub fn running(&self) -> bool {
        self.inner.state.lock().unwrap().running
    }

    /// Whether every non-finished transfer is parked.
    pub fn paused(&self) -> bool {
        self.inner.state.lock().unwrap().paused
    }

    /// Whether the batch reached its terminal state.
    pub fn finished(&self) -> bool {
        self.inner.state.lock().unwrap().finished
    }

    /// The configured concurrency cap.
    pub fn concurrent_transfers(&self) -> usize {
        self.inner.config.concurrent_transfers
    }

    /// The configured tick period.
    pub fn tick_interval(&self) -> Duration {
        self.inner.config.tick_interval
    }

    /// Handles to the member units, in descriptor order.
    pub fn units(&self) -> Vec<TransferUnit> {
        self.inner.state.lock().unwrap().units.clone()
    }

    /// Handle to the unit at `index` in descriptor order.
    pub fn unit(&self, index: usize) -> Option<TransferUnit> {
        self.inner.state.lock().unwrap().units.get(index).cloned()
    }

    /// Opens a subscription to the batch's state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.inner.events.subscribe()
    }

    /// Starts the batch, or resumes it when it is paused or a pause is
    /// still pending.
    ///
    /// The first start spawns the tick task that admits transfers up to
    /// the concurrency cap. Starting a batch that is already running
    /// (and not paused) or has finished is a usage error.
    pub fn start(&self) -> crate::Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.finished {
            return Err(Error::InvalidState(
                "the batch has finished and cannot be restarted".into(),
            ));
        }
        if state.paused || state.should_pause {
            debug!("Resuming batch");
            state.should_pause = false;
            state.should_resume = true;
            return Ok(());
        }
        if state.running {
            return Err(Error::InvalidState(
                "the batch is already running; it needs to be stopped before it may be restarted"
                    .into(),
            ));
        }

        debug!("Starting batch of {} transfers", state.units.len());
        state.running = true;
        drop(state);
        self.inner.events.emit(StateEvent::BatchRunning(true));

        let inner = Arc::clone(&self.inner);
        let period = self.inner.config.tick_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // a tick is only scheduled after the previous one completed
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !Inner::tick(&inner) {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Requests a collective pause.
    ///
    /// The aggregate `paused` flag is set once every active transfer has
    /// parked. Pausing a batch that is not running, or pausing twice
    /// without an intervening resume, is a usage error.
    pub fn pause(&self) -> crate::Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.running {
            return Err(Error::InvalidState(
                "the batch needs to be started before it can be paused".into(),
            ));
        }
        if state.paused || state.should_pause {
            return Err(Error::InvalidState("the batch is already paused".into()));
        }

        debug!("Pausing batch");
        state.should_pause = true;
        state.should_resume = false;
        Ok(())
    }

    /// Requests termination of the batch.
    ///
    /// Active transfers are cancelled (paused ones are woken first) and
    /// the batch settles as finished once none is still running. Idle
    /// units are never started. Stopping a batch that is not running is
    /// a usage error.
    pub fn stop(&self) -> crate::Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.running {
            return Err(Error::InvalidState(
                "the batch needs to be started before it can be stopped".into(),
            ));
        }

        debug!("Stopping batch");
        state.should_stop = true;
        state.should_pause = false;
        state.should_resume = false;
        Ok(())
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("BatchCoordinator")
            .field("units", &state.units.len())
            .field("running", &state.running)
            .field("paused", &state.paused)
            .field("finished", &state.finished)
            .finish()
    }
}

impl Inner {
    /// One pass of the coordinating tick. Returns `false` once the batch
    /// reached its terminal state and the tick is to be removed.
    fn tick(inner: &Arc<Inner>) -> bool {
        let mut state = inner.state.lock().unwrap();
        let cap = inner.config.concurrent_transfers.max(1);
        let mut finished_units = 0;

        for index in 0..state.units.len() {
            let unit = state.units[index].clone();
            if unit.is_finished() {
                finished_units += 1;
                // a finished admission frees its slot exactly once
                let slot = &mut state.slots[index];
                if slot.admitted && !slot.released {
                    slot.released = true;
                    state.active -= 1;
                }
            } else if state.should_stop && unit.is_running() {
                unit.stop();
            } else if state.should_pause && unit.is_running() && !unit.is_paused() {
                unit.pause();
            } else if !state.should_stop
                && !state.should_pause
                && !state.should_resume
                && !state.paused
                && state.active < cap
                && unit.phase() == Phase::Idle
            {
                unit.start();
                state.slots[index].admitted = true;
                state.active += 1;
            } else if state.should_resume && unit.is_running() {
                // resuming never counts as a new admission. Every
                // running unit gets the start: it wakes a parked unit
                // and voids a propagated pause the unit has not honored
                // yet, so no unit can park after the resume settles.
                unit.start();
            }
        }

        let running_units = state.units.iter().filter(|u| u.is_running()).count();
        let paused_units = state.units.iter().filter(|u| u.is_paused()).count();

        // aggregate resolution, first match wins
        if finished_units == state.units.len() {
            debug!("All transfers finished");
            state.running = false;
            state.finished = true;
            drop(state);
            inner.events.emit(StateEvent::BatchRunning(false));
            inner.events.emit(StateEvent::BatchFinished);
            return false;
        }
        if state.should_stop && running_units == 0 {
            debug!("Stop drained the batch");
            state.should_stop = false;
            state.running = false;
            state.finished = true;
            drop(state);
            inner.events.emit(StateEvent::BatchRunning(false));
            inner.events.emit(StateEvent::BatchFinished);
            return false;
        }
        if state.should_pause && paused_units == running_units {
            state.should_pause = false;
            if !state.paused {
                debug!("Batch paused");
                state.paused = true;
                drop(state);
                inner.events.emit(StateEvent::BatchPaused(true));
            }
            return true;
        }
        if state.should_resume && paused_units == 0 {
            state.should_resume = false;
            if state.paused {
                debug!("Batch resumed");
                state.paused = false;
                drop(state);
                inner.events.emit(StateEvent::BatchPaused(false));
            }
            return true;
        }

        true
    }
}
