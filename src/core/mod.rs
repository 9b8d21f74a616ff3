//! Core types shared by every stage of a build.
//!
//! - [`link`]: syntactic link classification
//! - [`context`]: cancellation token with optional deadline
//! - [`state`]: process-wide shutdown handling (Ctrl+C)

pub mod context;
pub mod link;
pub mod state;

pub use context::{Context, ContextError};
pub use link::LinkKind;
