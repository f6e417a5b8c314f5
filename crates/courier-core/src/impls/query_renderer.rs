//! QueryRenderer - TrackingEvent を GET URL に変換

use url::Url;

use crate::domain::{DeliveryRequest, RenderError, TrackingEvent};
use crate::error::{CourierError, CourierResult};
use crate::ports::Renderer;

/// Renders a [`TrackingEvent`] as `<server>/<tracking_id>/wt?p=<name>&...`.
///
/// Query keys:
/// - `p`: event name
/// - `eid`: event id (ULID)
/// - `mts`: creation time, unix millis
/// - every entry of `params`, in key order
#[derive(Debug, Clone)]
pub struct QueryRenderer {
    base: Url,
}

impl QueryRenderer {
    pub fn new(server_url: &str, tracking_id: &str) -> CourierResult<Self> {
        if tracking_id.trim().is_empty() {
            return Err(CourierError::InvalidConfig(
                "tracking id must not be empty".to_string(),
            ));
        }
        let mut base = Url::parse(server_url)
            .map_err(|e| CourierError::InvalidConfig(format!("server url {server_url}: {e}")))?;
        base.path_segments_mut()
            .map_err(|_| {
                CourierError::InvalidConfig(format!("server url {server_url} cannot be a base"))
            })?
            .pop_if_empty()
            .push(tracking_id)
            .push("wt");
        Ok(Self { base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

impl Renderer<TrackingEvent> for QueryRenderer {
    fn render(&self, event: &TrackingEvent) -> Result<DeliveryRequest, RenderError> {
        if event.name.trim().is_empty() {
            return Err(RenderError::new(format!("event {} has no name", event.id)));
        }
        if let Some((key, _)) = event.params.iter().find(|(key, _)| key.trim().is_empty()) {
            return Err(RenderError::new(format!(
                "event {} has an empty parameter key {key:?}",
                event.id
            )));
        }

        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("p", &event.name)
                .append_pair("eid", &event.id.to_string())
                .append_pair("mts", &event.created_at.timestamp_millis().to_string());
            for (key, value) in &event.params {
                query.append_pair(key, value);
            }
        }
        Ok(DeliveryRequest::new(url.to_string()))
    }
}
