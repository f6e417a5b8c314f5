//! SendQueueBuilder - send queue の構築とワイヤリング
//!
//! # 起動時の流れ
//! 1. config を検証（initial_send_delay の clamp など）
//! 2. BackupStore から未送信イベントを復元
//! 3. 復元したイベントがあれば flush モードで即送信

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use super::{EventStore, SendQueue};
use crate::config::QueueConfig;
use crate::domain::Event;
use crate::error::{CourierError, CourierResult};
use crate::impls::{JsonFileBackup, MemoryBackup};
use crate::ports::{BackupStore, Renderer, Transport};

/// Builds a [`SendQueue`].
///
/// # 使用例
/// ```ignore
/// let queue = SendQueueBuilder::<TrackingEvent>::new(config)
///     .renderer(Arc::new(QueryRenderer::new("https://collector.example", "1234")?))
///     .transport(Arc::new(my_transport))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - renderer / transport が無ければ build() でエラー
/// - backup 未指定なら config.backup_path の JSON ファイル、それも無ければメモリのみ
pub struct SendQueueBuilder<E: Event> {
    config: QueueConfig,
    renderer: Option<Arc<dyn Renderer<E>>>,
    transport: Option<Arc<dyn Transport>>,
    backup: Option<Arc<dyn BackupStore<E>>>,
}

impl<E: Event> SendQueueBuilder<E> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            renderer: None,
            transport: None,
            backup: None,
        }
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer<E>>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn backup(mut self, backup: Arc<dyn BackupStore<E>>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Restore the backup and start the queue on the current tokio runtime.
    pub fn build(self) -> CourierResult<SendQueue<E>> {
        let runtime = Handle::try_current().map_err(|_| CourierError::NoRuntime)?;
        let config = self.config.validated()?;
        let renderer = self.renderer.ok_or(CourierError::MissingPort("renderer"))?;
        let transport = self.transport.ok_or(CourierError::MissingPort("transport"))?;
        let backup: Arc<dyn BackupStore<E>> = match (self.backup, &config.backup_path) {
            (Some(backup), _) => backup,
            (None, Some(path)) => Arc::new(JsonFileBackup::new(path.clone())),
            (None, None) => Arc::new(MemoryBackup::new()),
        };

        let restored = backup.restore();
        let store = EventStore::from_events(restored, config.max_url_count);
        let pending = store.len();

        let queue = SendQueue::new(
            store,
            renderer,
            transport,
            backup,
            &config,
            runtime,
        );

        if pending > 0 {
            info!(item_count = pending, "restored pending events, flushing");
            queue.flush_now();
        }
        Ok(queue)
    }
}
