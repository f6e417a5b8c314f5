use serde::Serialize;

use crate::queue::SendPhase;

/// Point-in-time view of a send queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub item_count: usize,
    pub successful_sends: u32,
    pub failed_sends: u32,
    pub phase: SendPhase,
    pub flush_requested: bool,
    pub shutdown_requested: bool,
}
