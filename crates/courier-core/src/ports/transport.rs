//! Transport port - 配送の抽象化（HTTP client など）

use async_trait::async_trait;

use crate::domain::{DeliveryError, DeliveryRequest};

/// Transport performs one delivery attempt.
///
/// # Contract
/// - Called outside the queue lock, at most one call in flight per queue.
/// - The returned future resolves exactly once. The queue additionally wraps
///   the call in its `delivery_timeout`; elapse counts as a recoverable failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, request: DeliveryRequest) -> Result<(), DeliveryError>;
}
