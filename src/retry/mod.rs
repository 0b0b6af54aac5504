//! Retry and sequencing
//!
//! Sequence numbers correlate requests with replies when the link to the
//! destination is unreliable; the scheduler resends unanswered requests.

mod scheduler;
mod sequence;

pub use scheduler::{JobOutcome, RetryJob, RetryScheduler};
pub use sequence::{RetryOutcome, SequenceCounter, SENTINEL};
