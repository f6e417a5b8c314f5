//! Event model: what the queue stores and what it hands to the renderer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Event is the opaque unit the send queue stores and delivers.
///
/// The queue never looks inside an event. It only needs to:
/// - clone it (snapshot for backup, peek for rendering)
/// - serialize / deserialize it (backup file)
/// - move it between the producer thread and the background runtime
///
/// Any type satisfying the bounds is an event; there is nothing to implement.
pub trait Event: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Event for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A single tracking occurrence (page view, media event, ...).
///
/// `params` is a sorted map so the rendered query string is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: Ulid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl TrackingEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            created_at: Utc::now(),
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A rendered event, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub url: String,
}

impl DeliveryRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
