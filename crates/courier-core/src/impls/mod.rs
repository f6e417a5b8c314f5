//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonFileBackup**: 本番用のバックアップ（一時ファイル + rename）
//! - **MemoryBackup**: メモリのみ（バックアップ無し運用・テスト用）
//! - **QueryRenderer**: TrackingEvent → GET URL
//! - **ScriptedTransport**: テスト・デモ用の Transport
//!
//! # 本番用 Transport
//! HTTP client による Transport はホストアプリ側で実装します。

pub mod json_file_backup;
pub mod memory_backup;
pub mod query_renderer;
pub mod scripted_transport;

pub use self::json_file_backup::JsonFileBackup;
pub use self::memory_backup::MemoryBackup;
pub use self::query_renderer::QueryRenderer;
pub use self::scripted_transport::{DeliveryRecord, ScriptedTransport};
