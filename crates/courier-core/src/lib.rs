//! courier-core
//!
//! Durable send queue for client-side tracking events.
//!
//! # モジュール構成
//! - **domain**: Event, TrackingEvent, DeliveryRequest, DeliveryOutcome
//! - **ports**: 抽象化レイヤー（Renderer, Transport, BackupStore）
//! - **queue**: EventStore, SendQueue（scheduler）, LifecycleBridge
//! - **impls**: 実装（JsonFileBackup, MemoryBackup, QueryRenderer, ScriptedTransport）
//! - **config**: QueueConfig
//! - **observability**: QueueStatus

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use config::QueueConfig;
pub use error::{CourierError, CourierResult};
pub use observability::QueueStatus;
pub use queue::{LifecycleBridge, LifecycleSignal, SendQueue, SendQueueBuilder};
