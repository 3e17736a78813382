//! Chained installer supervision.
//!
//! One component may be a long-running installer of its own (for example a
//! runtime that downloads further pieces). It is launched as a child process
//! and reports through a [`ChainChannel`], a small fixed-layout file both
//! processes open. The [`ChainMonitor`] turns the child's reports into
//! progress and carries cancellation back as abort flags.

mod channel;
mod monitor;

pub use channel::{
    raw_to_percent, ChainChannel, ChannelState, CHANNEL_ENV, CHANNEL_SIZE, LAYOUT_VERSION,
    RESULT_INTERNAL_ERROR, RESULT_PENDING, RESULT_SUCCESS, STEP_UNITS,
};
pub use monitor::{ChainMonitor, ChainProgress, ChainResult, DEFAULT_POLL_INTERVAL};
