//! Progress reporting to the operator.

/// Receiver of operator-facing progress updates.
///
/// Calls are fire-and-forget and may come from the orchestrator thread while
/// a UI renders on another, so implementations must be `Send + Sync`.
pub trait ProgressSink: Send + Sync {
    /// Short status line ("Downloading runtime.msi").
    fn set_status_message(&self, message: &str);

    /// Overall progress, 0 to 100.
    fn set_progress(&self, percent: u8);

    /// Prominent message shown once for a stage ("Installing prerequisites").
    fn set_large_message(&self, message: &str);
}

/// Sink that forwards every update to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn set_status_message(&self, message: &str) {
        tracing::info!(status = message, "Progress status");
    }

    fn set_progress(&self, percent: u8) {
        tracing::debug!(percent, "Progress");
    }

    fn set_large_message(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_status_message(&self, _message: &str) {}
    fn set_progress(&self, _percent: u8) {}
    fn set_large_message(&self, _message: &str) {}
}

/// Scale `done` out of `total` into a percentage, clamped to 100.
///
/// An empty total counts as complete.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
