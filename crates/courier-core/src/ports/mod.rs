//! Ports - 抽象化レイヤー
//!
//! Send queue が依存する外部コラボレータの trait を定義します。
//! 実装の詳細（HTTP client, ファイル形式など）はここには置きません。
//!
//! # 設計原則
//! - Renderer: 純粋関数（event → request）
//! - Transport: 1 回の配送を試み、成功 / recoverable / non-recoverable を返す
//! - BackupStore: 未送信イベントの永続化（失敗しても queue は止めない）

pub mod backup_store;
pub mod renderer;
pub mod transport;

pub use self::backup_store::{BackupError, BackupStore};
pub use self::renderer::Renderer;
pub use self::transport::Transport;
