use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::Event;
use crate::ports::{BackupError, BackupStore};

/// BackupStore kept in memory: the queue survives nothing but keeps working.
///
/// Also used in tests to count checkpoints and seed a "previous process".
pub struct MemoryBackup<E> {
    events: Mutex<Vec<E>>,
    saves: AtomicUsize,
}

impl<E> MemoryBackup<E> {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    /// Pretend a previous process left these events behind.
    pub fn with_events(events: Vec<E>) -> Self {
        Self {
            events: Mutex::new(events),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<E: Clone> MemoryBackup<E> {
    /// Last saved snapshot.
    pub fn contents(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<E> Default for MemoryBackup<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> BackupStore<E> for MemoryBackup<E> {
    fn save(&self, events: &[E]) -> Result<(), BackupError> {
        let mut stored = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        *stored = events.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore(&self) -> Vec<E> {
        self.contents()
    }
}
