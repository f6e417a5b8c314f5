//! SendQueue: durable, single-flight delivery of queued events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DelayPolicy, EventStore, SendCounters, SendPhase};
use crate::config::QueueConfig;
use crate::domain::{DeliveryError, DeliveryOutcome, DeliveryRequest, Event};
use crate::observability::QueueStatus;
use crate::ports::{BackupStore, Renderer, Transport};

/// Everything guarded by the queue lock.
///
/// Design:
/// - One mutex for the store, the counters and the mode flags.
/// - Never held across an `.await`; the transport call runs outside it.
/// - Backup snapshots are taken here, but written after the lock is released.
struct SendQueueState<E> {
    store: EventStore<E>,
    counters: SendCounters,
    phase: SendPhase,
    flush_requested: bool,
    shutdown_requested: bool,
    next_ticket: u64,
    timer: Option<JoinHandle<()>>,
    checkpoint_seq: u64,
}

impl<E: Clone> SendQueueState<E> {
    fn checkpoint(&mut self) -> Checkpoint<E> {
        self.checkpoint_seq += 1;
        Checkpoint {
            seq: self.checkpoint_seq,
            events: self.store.snapshot(),
        }
    }
}

/// Store snapshot waiting to be written to the backup.
struct Checkpoint<E> {
    seq: u64,
    events: Vec<E>,
}

struct Shared<E> {
    state: Mutex<SendQueueState<E>>,
    /// Sequence number of the last snapshot handed to the backup.
    written_seq: Mutex<u64>,
    renderer: Arc<dyn Renderer<E>>,
    transport: Arc<dyn Transport>,
    backup: Arc<dyn BackupStore<E>>,
    policy: DelayPolicy,
    give_up_after: u32,
    delivery_timeout: Duration,
    runtime: Handle,
}

impl<E> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, SendQueueState<E>> {
        // plain data: keep going after a poisoned lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save a snapshot unless a newer one already reached the backup.
    fn write_checkpoint(&self, checkpoint: Checkpoint<E>) {
        let mut written = self.written_seq.lock().unwrap_or_else(PoisonError::into_inner);
        if checkpoint.seq <= *written {
            debug!(seq = checkpoint.seq, "stale backup snapshot skipped");
            return;
        }
        *written = checkpoint.seq;
        match self.backup.save(&checkpoint.events) {
            Ok(()) => debug!(item_count = checkpoint.events.len(), "send queue backup saved"),
            Err(e) => warn!(error = %e, "send queue backup failed, continuing in memory"),
        }
    }
}

/// The head event handed to the transport, plus where it sat in the store.
struct InFlight {
    position: u64,
    request: DeliveryRequest,
}

/// Handle to a send queue. Cheap to clone; all clones drive the same queue.
///
/// Producers call [`SendQueue::add`] from any thread. Timers and deliveries run
/// on the tokio runtime captured when the queue was built.
pub struct SendQueue<E: Event> {
    shared: Arc<Shared<E>>,
}

impl<E: Event> Clone for SendQueue<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Event> SendQueue<E> {
    /// `config` must already be validated.
    pub(crate) fn new(
        store: EventStore<E>,
        renderer: Arc<dyn Renderer<E>>,
        transport: Arc<dyn Transport>,
        backup: Arc<dyn BackupStore<E>>,
        config: &QueueConfig,
        runtime: Handle,
    ) -> Self {
        let state = SendQueueState {
            store,
            counters: SendCounters::default(),
            phase: SendPhase::Idle,
            flush_requested: false,
            shutdown_requested: false,
            next_ticket: 0,
            timer: None,
            checkpoint_seq: 0,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                written_seq: Mutex::new(0),
                renderer,
                transport,
                backup,
                policy: config.delay_policy(),
                give_up_after: config.give_up_after,
                delivery_timeout: config.delivery_timeout(),
                runtime,
            }),
        }
    }

    /// Enqueue an event. Never blocks on the network.
    ///
    /// When the store is full the oldest event is evicted first. Events added
    /// after shutdown are kept (and backed up) but never sent.
    pub fn add(&self, event: E) {
        let mut state = self.shared.lock();
        if state.store.add(event).is_some() {
            warn!(
                max_count = state.store.max_count(),
                "send queue full, evicted oldest event"
            );
        }
        debug!(item_count = state.store.len(), "event added to send queue");
        self.schedule_later(&mut state);
    }

    /// Switch to flush mode and attempt right away.
    ///
    /// A pending timer is superseded. If an attempt is already in flight it
    /// keeps going back-to-back once it resolves.
    pub fn flush_now(&self) {
        let mut state = self.shared.lock();
        if state.shutdown_requested {
            debug!("flush ignored, send queue is shut down");
            return;
        }
        state.flush_requested = true;
        match state.phase {
            SendPhase::Attempting | SendPhase::Shutdown => return,
            SendPhase::Scheduled { .. } => {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
            }
            SendPhase::Idle => {}
        }
        state.phase = SendPhase::Attempting;
        drop(state);

        let queue = self.clone();
        self.shared.runtime.spawn(async move {
            queue.run_attempts().await;
        });
    }

    /// Drop every pending event (e.g. the user opted out).
    ///
    /// The emptied store is checkpointed so the events do not come back on the
    /// next start.
    pub fn clear(&self) {
        let checkpoint = {
            let mut state = self.shared.lock();
            let dropped = state.store.clear();
            if dropped == 0 {
                return;
            }
            warn!(dropped, "send queue cleared, pending events discarded");
            state.checkpoint()
        };
        self.shared.write_checkpoint(checkpoint);
    }

    /// Stop sending for good. An attempt in flight still resolves normally.
    pub fn shutdown(&self) {
        let checkpoint = {
            let mut state = self.shared.lock();
            if state.shutdown_requested {
                return;
            }
            state.shutdown_requested = true;
            state.flush_requested = false;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            if state.phase != SendPhase::Attempting {
                state.phase = SendPhase::Shutdown;
            }
            info!(item_count = state.store.len(), "send queue shutting down");
            state.checkpoint()
        };
        self.shared.write_checkpoint(checkpoint);
    }

    /// Persist the current store now. Returns once the backup was written.
    pub fn save_backup(&self) {
        let checkpoint = self.shared.lock().checkpoint();
        self.shared.write_checkpoint(checkpoint);
    }

    /// Host is low on memory and may kill the process.
    pub fn on_memory_warning(&self) {
        info!("memory warning, saving send queue backup");
        self.save_backup();
    }

    /// Host is leaving the foreground.
    pub fn on_background(&self) {
        info!("application no longer in foreground");
        self.checkpoint_and_flush();
    }

    /// Host is about to terminate.
    pub fn on_terminate(&self) {
        info!("application terminating");
        self.checkpoint_and_flush();
    }

    pub fn item_count(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().store.is_empty()
    }

    /// Pending events, oldest first.
    pub fn snapshot(&self) -> Vec<E> {
        self.shared.lock().store.snapshot()
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            item_count: state.store.len(),
            successful_sends: state.counters.successful_sends,
            failed_sends: state.counters.failed_sends,
            phase: state.phase,
            flush_requested: state.flush_requested,
            shutdown_requested: state.shutdown_requested,
        }
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    fn checkpoint_and_flush(&self) {
        let (checkpoint, pending) = {
            let mut state = self.shared.lock();
            (state.checkpoint(), state.store.len())
        };
        self.shared.write_checkpoint(checkpoint);
        if pending == 0 {
            return;
        }
        info!(item_count = pending, "trying to send out remaining events");
        self.flush_now();
    }

    /// Write a snapshot from inside the attempt loop without stalling a
    /// runtime worker on file I/O.
    async fn persist(&self, checkpoint: Checkpoint<E>) {
        let shared = Arc::clone(&self.shared);
        if let Err(e) =
            tokio::task::spawn_blocking(move || shared.write_checkpoint(checkpoint)).await
        {
            warn!(error = %e, "send queue backup task failed");
        }
    }

    /// Arm the delay timer unless something already takes care of the store.
    fn schedule_later(&self, state: &mut SendQueueState<E>) {
        if state.shutdown_requested {
            return;
        }
        if state.store.is_empty() {
            debug!("nothing to send");
            return;
        }
        if state.phase.is_busy() {
            return;
        }

        let delay = self.shared.policy.next_delay(&state.counters);
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.phase = SendPhase::Scheduled { ticket };
        debug!(delay_secs = delay.as_secs(), ticket, "next delivery scheduled");

        let queue = self.clone();
        state.timer = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.claim_timer(ticket) {
                queue.run_attempts().await;
            }
        }));
    }

    /// Scheduled -> Attempting, only if this timer was not superseded.
    fn claim_timer(&self, ticket: u64) -> bool {
        let mut state = self.shared.lock();
        if state.phase != (SendPhase::Scheduled { ticket }) {
            return false;
        }
        state.timer = None;
        state.phase = SendPhase::Attempting;
        true
    }

    /// Attempt loop. The caller has already moved the phase to `Attempting`.
    async fn run_attempts(self) {
        loop {
            let Some(in_flight) = self.prepare_attempt() else {
                return;
            };
            debug!(url = %in_flight.request.url, "delivering event");

            // ロック外で送信する（producer をネットワーク待ちでブロックしない）
            let result = match tokio::time::timeout(
                self.shared.delivery_timeout,
                self.shared.transport.deliver(in_flight.request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::recoverable("delivery timed out")),
            };

            let (again, checkpoint) = self.resolve_attempt(in_flight.position, result);
            if let Some(checkpoint) = checkpoint {
                self.persist(checkpoint).await;
            }
            if !again {
                return;
            }
        }
    }

    /// Render the head, dropping unrenderable events on the way.
    ///
    /// Returns `None` (and leaves `Attempting`) when there is nothing to send.
    fn prepare_attempt(&self) -> Option<InFlight> {
        let mut state = self.shared.lock();
        loop {
            if state.shutdown_requested {
                state.phase = SendPhase::Shutdown;
                return None;
            }
            let position = state.store.head_position();
            let Some(head) = state.store.peek_head() else {
                state.flush_requested = false;
                state.phase = SendPhase::Idle;
                debug!("nothing to send");
                return None;
            };
            match self.shared.renderer.render(head) {
                Ok(request) => return Some(InFlight { position, request }),
                Err(e) => {
                    state.store.dequeue_head();
                    warn!(error = %e, "event cannot be rendered, dropped");
                }
            }
        }
    }

    /// Apply the attempt result.
    ///
    /// Returns whether to attempt again immediately, plus the snapshot to
    /// persist before doing so.
    fn resolve_attempt(
        &self,
        position: u64,
        result: Result<(), DeliveryError>,
    ) -> (bool, Option<Checkpoint<E>>) {
        let mut state = self.shared.lock();

        let outcome = DeliveryOutcome::classify(&result);
        let reason = result.err().map(|e| e.message).unwrap_or_default();

        match outcome {
            DeliveryOutcome::Success => {
                state.counters.record_success();
                state.store.dequeue_at(position);
                debug!(item_count = state.store.len(), "event delivered");
            }
            DeliveryOutcome::RecoverableFailure => {
                state.counters.record_failure();
                // A failing collector ends flush mode; back to the delay timer.
                state.flush_requested = false;
                warn!(
                    failed_sends = state.counters.failed_sends,
                    error = %reason,
                    "delivery failed, will retry"
                );
            }
            DeliveryOutcome::NonRecoverableFailure => {
                state.counters.record_failure();
                if state.store.dequeue_at(position).is_some() {
                    warn!(error = %reason, "delivery not recoverable, event dropped");
                }
            }
        }

        if outcome.is_failure() && state.counters.failed_sends > self.shared.give_up_after {
            // Same reset as a success: see `SendCounters::reset_after_give_up`.
            state.counters.reset_after_give_up();
            if state.store.dequeue_at(position).is_some() {
                warn!(
                    give_up_after = self.shared.give_up_after,
                    "event failed too often, dropped"
                );
            }
        }

        if state.shutdown_requested {
            state.phase = SendPhase::Shutdown;
            state.flush_requested = false;
            return (false, Some(state.checkpoint()));
        }

        if state.flush_requested {
            return (true, Some(state.checkpoint()));
        }

        state.phase = SendPhase::Idle;
        self.schedule_later(&mut state);
        (false, None)
    }
}
