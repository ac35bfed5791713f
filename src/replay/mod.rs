//! Session replay
//!
//! - `ReplayController` state machine over the discovered recordings
//! - `SessionContext` owning the active session's queue and dataset

pub mod controller;
pub mod state;

pub use controller::{LoadStep, ReplayController, StreamStep};
pub use state::{ReplayEvent, ReplayState, SessionContext};
