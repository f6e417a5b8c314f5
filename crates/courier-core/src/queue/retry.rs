//! Retry policy: send counters and delay selection.

use std::time::Duration;

use serde::Serialize;

/// Success / failure counters of one send queue.
///
/// These are not per-event retry counts. They only feed the delay policy
/// and the giveup ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendCounters {
    pub successful_sends: u32,
    pub failed_sends: u32,
}

impl SendCounters {
    pub fn record_success(&mut self) {
        self.successful_sends = 1;
        self.failed_sends = 0;
    }

    pub fn record_failure(&mut self) {
        self.failed_sends = self.failed_sends.saturating_add(1);
    }

    /// Reset after a forced drop.
    ///
    /// Same values as a success: the next delay is the steady-state one.
    pub fn reset_after_give_up(&mut self) {
        self.successful_sends = 1;
        self.failed_sends = 0;
    }
}

/// Delay policy for the next scheduled attempt.
#[derive(Debug, Clone)]
pub struct DelayPolicy {
    /// Short delay used until the first event got out.
    pub initial_send_delay: Duration,

    /// Steady-state delay.
    pub send_delay: Duration,

    /// Bootstrap delay stops applying once this many sends failed in a row.
    pub max_failed_sends: u32,
}

impl DelayPolicy {
    /// `initial_send_delay` is clamped to `send_delay`.
    pub fn new(initial_send_delay: Duration, send_delay: Duration, max_failed_sends: u32) -> Self {
        Self {
            initial_send_delay: initial_send_delay.min(send_delay),
            send_delay,
            max_failed_sends,
        }
    }

    /// Pick the delay for the next attempt.
    ///
    /// - nothing delivered yet and few failures: `initial_send_delay`
    /// - otherwise: `send_delay`
    pub fn next_delay(&self, counters: &SendCounters) -> Duration {
        if counters.successful_sends == 0 && counters.failed_sends < self.max_failed_sends {
            self.initial_send_delay
        } else {
            self.send_delay
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(180), 5)
    }
}
