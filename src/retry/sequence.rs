//! Request/reply sequence numbers
//!
//! In retry mode every request carries a one-byte sequence number and the
//! destination echoes it in its reply. The counter starts uninitialised (`-1`),
//! its first value is `0`, and from then on it cycles through `1..=255`:
//! `0` is only ever produced again by an explicit [`SequenceCounter::reset`],
//! because the destination uses a `0` reply to ask for exactly that.

use std::fmt;

/// Value reported for a counter that has not produced a number yet
pub const SENTINEL: i16 = -1;

/// Result of checking a reply's sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The reply matches the outstanding request
    NoError,
    /// The destination lost track of the sequence and asks for a reset
    NullSequenceNumber,
    /// The reply belongs to some other request
    WrongSequenceNumber,
}

impl fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "no error"),
            Self::NullSequenceNumber => write!(f, "null sequence number"),
            Self::WrongSequenceNumber => write!(f, "wrong sequence number"),
        }
    }
}

/// Per-session sequence counter
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SequenceCounter {
    current: Option<u8>,
}

impl SequenceCounter {
    /// Create an uninitialised counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current value (back to the sentinel)
    pub fn initialize(&mut self) {
        self.current = None;
    }

    /// Move to the next sequence number and return it
    pub fn advance(&mut self) -> u8 {
        let next = match self.current {
            None => 0,
            Some(u8::MAX) => 1,
            Some(n) => n + 1,
        };
        self.current = Some(next);
        next
    }

    /// Set the counter to the null sequence number `0`
    pub fn reset(&mut self) {
        self.current = Some(0);
    }

    /// Current number, `None` before the first request
    pub fn current(&self) -> Option<u8> {
        self.current
    }

    /// Current number with the `-1` sentinel for "not yet initialised"
    pub fn value(&self) -> i16 {
        self.current.map_or(SENTINEL, i16::from)
    }

    /// Classify a reply carrying `returned` as its sequence number
    pub fn classify(&self, returned: u8) -> RetryOutcome {
        let current = self.value();
        let returned = i16::from(returned);

        if returned == 0 && current != 0 {
            RetryOutcome::NullSequenceNumber
        } else if returned != current {
            RetryOutcome::WrongSequenceNumber
        } else {
            RetryOutcome::NoError
        }
    }
}
