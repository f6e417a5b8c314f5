//! Send state machine for the queue.

use serde::{Deserialize, Serialize};

/// Where the sender currently is.
///
/// State transitions:
/// - Idle -> Scheduled (add / after an attempt, delayed mode)
/// - Idle | Scheduled -> Attempting (timer fired, flush requested, startup flush)
/// - Attempting -> Attempting (flush mode, back-to-back)
/// - Attempting -> Idle -> Scheduled (attempt resolved, delayed mode)
/// - any -> Shutdown (shutdown requested; Attempting finishes its attempt first)
///
/// Design note: "one timer at a time" and "one attempt in flight" both fall
/// out of having a single phase value. A timer only acts when the phase still
/// carries its ticket, so a superseded timer is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SendPhase {
    /// No timer pending, nothing in flight.
    Idle,

    /// A delayed attempt is pending.
    Scheduled { ticket: u64 },

    /// Exactly one delivery is being prepared or is in flight.
    Attempting,

    /// Terminal: no further attempts.
    Shutdown,
}

impl SendPhase {
    /// Is a timer or an attempt already taking care of the store?
    pub fn is_busy(self) -> bool {
        matches!(self, SendPhase::Scheduled { .. } | SendPhase::Attempting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SendPhase::Shutdown)
    }
}
