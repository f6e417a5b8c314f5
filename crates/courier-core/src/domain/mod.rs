//! Domain model (events, delivery requests, delivery outcomes).

pub mod delivery;
pub mod event;

pub use delivery::{DeliveryError, DeliveryOutcome, RenderError};
pub use event::{DeliveryRequest, Event, TrackingEvent};
