//! Renderer port - event から配送リクエストへの変換

use crate::domain::{DeliveryRequest, RenderError};

/// Renderer turns a queued event into a transport request.
///
/// Must be pure: the scheduler calls it under the queue lock and may call it
/// again for the same event on the next retry.
pub trait Renderer<E>: Send + Sync {
    fn render(&self, event: &E) -> Result<DeliveryRequest, RenderError>;
}
