//! Frame dispatch
//!
//! Single-slot intake plus the dual-service dispatcher that drains it at a
//! fixed polling rate.

pub mod dispatcher;
pub mod slot;

pub use dispatcher::{Dispatcher, FrameOutcome};
pub use slot::FrameSlot;
