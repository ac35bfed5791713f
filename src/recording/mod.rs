//! Session recordings
//!
//! Discovery of recording files and extraction of their image frames.

pub mod reader;
pub mod session;

pub use reader::{load_frames, SessionLoadError};
pub use session::{discover_sessions, SessionFilter, SessionId, SessionRecording};
