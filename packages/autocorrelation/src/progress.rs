//! Progress reporting for the permutation loops.
//!
//! The engine reports through [`ProgressCallback`] so callers choose the
//! rendering: `indicatif` bars in the CLI, nothing in tests and library
//! use.

/// Receives progress updates from long-running computations.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// across threads.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message shown alongside the indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

