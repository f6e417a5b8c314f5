//! JsonFileBackup - JSON ファイルへのバックアップ
//!
//! # 実装詳細
//! - `{ "version": 1, "events": [...] }` を一時ファイルに書いてから rename
//! - 読めない・壊れている・version 違いのファイルは「空」として扱う

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Event;
use crate::ports::{BackupError, BackupStore};

const BACKUP_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct BackupFileRef<'a, E> {
    version: u32,
    events: &'a [E],
}

#[derive(Deserialize)]
struct BackupFile<E> {
    version: u32,
    events: Vec<E>,
}

/// Backup of one queue in a single JSON file.
pub struct JsonFileBackup<E> {
    path: PathBuf,
    _marker: PhantomData<fn() -> E>,
}

impl<E> JsonFileBackup<E> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<E: Event> BackupStore<E> for JsonFileBackup<E> {
    fn save(&self, events: &[E]) -> Result<(), BackupError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer(
                &mut writer,
                &BackupFileRef {
                    version: BACKUP_FORMAT_VERSION,
                    events,
                },
            )?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), item_count = events.len(), "backup written");
        Ok(())
    }

    fn restore(&self) -> Vec<E> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no backup to restore");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "backup unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<BackupFile<E>>(&raw) {
            Ok(file) if file.version == BACKUP_FORMAT_VERSION => {
                debug!(path = %self.path.display(), item_count = file.events.len(), "backup restored");
                file.events
            }
            Ok(file) => {
                warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "backup has unknown format version, starting empty"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "backup corrupt, starting empty");
                Vec::new()
            }
        }
    }
}
