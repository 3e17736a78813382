//! Supervision of a chained installer.

use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::channel::{ChainChannel, ChannelState, RESULT_INTERNAL_ERROR, RESULT_SUCCESS};
use crate::installer::ChildProcess;

/// Default interval between channel and child polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Progress reported by the chained child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProgress {
    /// Blended progress, 0 to 85.
    pub percent: u8,
    /// The child's current step label.
    pub step: String,
}

/// Outcome of a chained installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainResult {
    /// Channel result code.
    pub code: i32,
    /// The child exited before reporting both phases finished.
    pub crashed: bool,
    /// An abort was requested while monitoring.
    pub aborted: bool,
}

impl ChainResult {
    pub fn is_success(&self) -> bool {
        self.code == RESULT_SUCCESS
    }

    fn internal(aborted: bool, crashed: bool) -> Self {
        Self {
            code: RESULT_INTERNAL_ERROR,
            crashed,
            aborted,
        }
    }
}

/// Watches a chained child through its channel.
pub struct ChainMonitor<'a> {
    channel: &'a ChainChannel,
    token: CancellationToken,
    poll_interval: Duration,
}

impl<'a> ChainMonitor<'a> {
    pub fn new(channel: &'a ChainChannel, token: CancellationToken) -> Self {
        Self {
            channel,
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ask the child to abort both phases. The child is never killed.
    pub fn abort(&self) {
        if let Err(e) = self.channel.request_abort() {
            tracing::warn!(error = %e, "Failed to signal abort to chained installer");
        }
    }

    /// Monitor `child` until it reports completion or exits.
    ///
    /// `on_progress` runs once per observed channel update. Cancelling the
    /// token requests an abort and keeps monitoring until the child stops.
    pub fn monitor(
        &self,
        child: &mut dyn ChildProcess,
        on_progress: &mut dyn FnMut(&ChainProgress),
    ) -> ChainResult {
        let mut last_generation: Option<u32> = None;
        let mut aborted = false;

        loop {
            if !aborted && self.token.is_cancelled() {
                tracing::info!(pid = child.id(), "Requesting chained installer abort");
                self.abort();
                aborted = true;
            }

            let state = match self.channel.snapshot() {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(error = %e, "Chain channel unreadable");
                    return ChainResult::internal(aborted, false);
                }
            };

            if last_generation != Some(state.generation) {
                last_generation = Some(state.generation);
                on_progress(&ChainProgress {
                    percent: state.blended_percent(),
                    step: state.current_step.clone(),
                });
            }

            if state.both_finished() {
                return finished(&state, aborted);
            }

            match child.try_wait() {
                Ok(Some(code)) => {
                    // The child may finish its reports right before exiting.
                    let state = self.channel.snapshot().ok();
                    return match state {
                        Some(state) if state.both_finished() => {
                            if last_generation != Some(state.generation) {
                                on_progress(&ChainProgress {
                                    percent: state.blended_percent(),
                                    step: state.current_step.clone(),
                                });
                            }
                            finished(&state, aborted)
                        }
                        _ => {
                            tracing::error!(
                                pid = child.id(),
                                exit_code = code,
                                "Chained installer exited without finishing"
                            );
                            ChainResult::internal(aborted, true)
                        }
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll chained installer");
                    return ChainResult::internal(aborted, false);
                }
            }

            thread::sleep(self.poll_interval);
        }
    }
}

fn finished(state: &ChannelState, aborted: bool) -> ChainResult {
    let code = state.final_result();
    tracing::debug!(result = %format!("{:#010x}", code), "Chain channel reports completion");
    ChainResult {
        code,
        crashed: false,
        aborted,
    }
}
