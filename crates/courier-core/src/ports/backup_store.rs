//! BackupStore port - 未送信イベントの永続化

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// BackupStore persists the ordered pending events of one queue.
///
/// # 設計原則
/// - `save` overwrites the whole snapshot; a crash mid-save must never leave
///   a file that `restore` chokes on.
/// - `restore` never fails: missing or unreadable content means "start empty".
/// - The location is owned by exactly one queue instance.
pub trait BackupStore<E>: Send + Sync {
    fn save(&self, events: &[E]) -> Result<(), BackupError>;

    fn restore(&self) -> Vec<E>;
}
