//! Batch coordination: admission, collective pause/resume/stop, and
//! aggregate state.
//!
//! The [`BatchCoordinator`] owns one [`crate::transfer::TransferUnit`]
//! per descriptor and drives all collective behavior from a fixed
//! periodic tick. Units make their own progress in parallel; the tick
//! only issues non-blocking requests and reads published unit state, so
//! external observers never see a transient combination of the aggregate
//! `running`/`paused`/`finished` flags.

pub mod builder;
pub mod config;
pub mod coordinator;

pub use builder::BatchBuilder;
pub use config::BatchConfig;
pub use coordinator::BatchCoordinator;
