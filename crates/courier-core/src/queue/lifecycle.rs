//! LifecycleBridge - ホスト環境のシグナルを send queue に伝える
//!
//! Host code registers nothing globally: it either calls
//! [`LifecycleBridge::handle`] directly or feeds signals through a channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::SendQueue;
use crate::domain::Event;

/// Host-environment signals the queue reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    /// Memory pressure: checkpoint only.
    MemoryWarning,

    /// About to leave the foreground: checkpoint, then flush.
    Background,

    /// About to terminate: checkpoint, then flush (best effort).
    Terminate,
}

pub struct LifecycleBridge<E: Event> {
    queue: SendQueue<E>,
}

impl<E: Event> LifecycleBridge<E> {
    pub fn new(queue: SendQueue<E>) -> Self {
        Self { queue }
    }

    pub fn handle(&self, signal: LifecycleSignal) {
        debug!(?signal, "lifecycle signal");
        match signal {
            LifecycleSignal::MemoryWarning => self.queue.on_memory_warning(),
            LifecycleSignal::Background => self.queue.on_background(),
            LifecycleSignal::Terminate => self.queue.on_terminate(),
        }
    }

    /// Handle signals until every sender is dropped.
    ///
    /// Runs on the queue's runtime, so host threads outside tokio may call it.
    pub fn spawn(self, mut signals: mpsc::Receiver<LifecycleSignal>) -> JoinHandle<()> {
        let runtime = self.queue.runtime().clone();
        runtime.spawn(async move {
            while let Some(signal) = signals.recv().await {
                self.handle(signal);
            }
            debug!("lifecycle channel closed");
        })
    }
}
