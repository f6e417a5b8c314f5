use std::sync::Arc;
use std::time::Duration;

use courier_core::domain::{DeliveryError, TrackingEvent};
use courier_core::impls::{MemoryBackup, QueryRenderer, ScriptedTransport};
use courier_core::queue::SendPhase;
use courier_core::{LifecycleBridge, LifecycleSignal, QueueConfig, SendQueue, SendQueueBuilder};
use tokio::time::sleep;
use url::Url;

fn config() -> QueueConfig {
    QueueConfig {
        initial_send_delay_secs: 5,
        send_delay_secs: 180,
        ..Default::default()
    }
}

fn start(
    config: QueueConfig,
    transport: Arc<ScriptedTransport>,
    backup: Arc<MemoryBackup<TrackingEvent>>,
) -> SendQueue<TrackingEvent> {
    SendQueueBuilder::<TrackingEvent>::new(config)
        .renderer(Arc::new(
            QueryRenderer::new("https://collector.example", "1234").unwrap(),
        ))
        .transport(transport)
        .backup(backup)
        .build()
        .unwrap()
}

/// Poll on virtual time until `cond` holds (gives up after ~3 virtual hours).
async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        sleep(Duration::from_secs(1)).await;
    }
    panic!("timed out waiting for: {what}");
}

fn page_of(url: &str) -> String {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "p")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

fn pages(transport: &ScriptedTransport) -> Vec<String> {
    transport
        .delivered_urls()
        .iter()
        .map(|url| page_of(url))
        .collect()
}

fn names(queue: &SendQueue<TrackingEvent>) -> Vec<String> {
    queue.snapshot().into_iter().map(|e| e.name).collect()
}

#[tokio::test(start_paused = true)]
async fn capacity_three_keeps_newest_and_drains_in_order() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let queue = start(
        QueueConfig {
            max_url_count: 3,
            ..config()
        },
        transport.clone(),
        Arc::new(MemoryBackup::new()),
    );

    for name in ["E1", "E2", "E3", "E4"] {
        queue.add(TrackingEvent::new(name));
    }
    assert_eq!(names(&queue), vec!["E2", "E3", "E4"]);

    eventually("queue drained", || queue.is_empty()).await;

    assert_eq!(transport.attempts(), 3);
    assert_eq!(pages(&transport), vec!["E2", "E3", "E4"]);
    let status = queue.status();
    assert_eq!(status.successful_sends, 1);
    assert_eq!(status.failed_sends, 0);
    assert_eq!(status.phase, SendPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn always_success_drains_n_events_in_n_attempts() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    let expected: Vec<String> = (0..6).map(|n| format!("page-{n}")).collect();
    for name in &expected {
        queue.add(TrackingEvent::new(name.clone()));
    }

    eventually("queue drained", || queue.is_empty()).await;

    assert_eq!(transport.attempts(), expected.len());
    assert_eq!(pages(&transport), expected);
}

#[tokio::test(start_paused = true)]
async fn first_send_uses_initial_delay_then_steady_delay() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));
    let started = tokio::time::Instant::now();

    queue.add(TrackingEvent::new("first"));
    queue.add(TrackingEvent::new("second"));
    eventually("queue drained", || queue.is_empty()).await;

    let records = transport.records();
    let first = records[0].at - started;
    let gap = records[1].at - records[0].at;
    assert!(first >= Duration::from_secs(5) && first < Duration::from_secs(6));
    assert!(gap >= Duration::from_secs(180) && gap < Duration::from_secs(181));
}

#[tokio::test(start_paused = true)]
async fn recoverable_failures_retry_until_give_up() {
    let transport = Arc::new(ScriptedTransport::always_failing(
        DeliveryError::recoverable("collector unreachable"),
    ));
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("stuck"));
    eventually("head given up", || queue.is_empty()).await;

    // give_up_after = 10: the 11th failure drops the event
    assert_eq!(transport.attempts(), 11);
    let status = queue.status();
    assert_eq!(status.successful_sends, 1);
    assert_eq!(status.failed_sends, 0);

    // bootstrap delay while failures < 5, steady delay afterwards
    let records = transport.records();
    let early = records[1].at - records[0].at;
    let late = records[5].at - records[4].at;
    assert!(early >= Duration::from_secs(5) && early < Duration::from_secs(6));
    assert!(late >= Duration::from_secs(180) && late < Duration::from_secs(181));

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.attempts(), 11);
}

#[tokio::test(start_paused = true)]
async fn non_recoverable_failure_drops_head_without_retry() {
    let transport = Arc::new(ScriptedTransport::new(
        vec![Err(DeliveryError::non_recoverable("HTTP 400"))],
        Ok(()),
    ));
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("rejected"));
    queue.add(TrackingEvent::new("accepted"));

    eventually("first attempt resolved", || queue.status().failed_sends == 1).await;
    assert_eq!(names(&queue), vec!["accepted"]);

    eventually("queue drained", || queue.is_empty()).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(pages(&transport), vec!["accepted"]);
}

#[tokio::test(start_paused = true)]
async fn unrenderable_event_is_dropped_and_queue_moves_on() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new(""));
    queue.add(TrackingEvent::new("valid"));
    queue.flush_now();

    eventually("queue drained", || queue.is_empty()).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(pages(&transport), vec!["valid"]);
}

#[tokio::test(start_paused = true)]
async fn clear_discards_pending_events() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let backup = Arc::new(MemoryBackup::new());
    let queue = start(config(), transport.clone(), backup.clone());

    for name in ["a", "b", "c"] {
        queue.add(TrackingEvent::new(name));
    }
    queue.save_backup();
    assert_eq!(backup.contents().len(), 3);

    queue.clear();
    assert_eq!(queue.item_count(), 0);
    assert!(backup.contents().is_empty());

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_during_attempt_does_not_retry_cleared_events() {
    let transport = Arc::new(
        ScriptedTransport::always_failing(DeliveryError::recoverable("collector down"))
            .with_latency(Duration::from_secs(10)),
    );
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("a"));
    queue.add(TrackingEvent::new("b"));
    queue.flush_now();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.status().phase, SendPhase::Attempting);

    queue.clear();
    queue.add(TrackingEvent::new("c"));

    eventually("retries after clear", || transport.attempts() >= 4).await;
    let attempted: Vec<String> = transport
        .records()
        .iter()
        .map(|record| page_of(&record.request.url))
        .collect();
    assert_eq!(attempted[0], "a");
    assert!(attempted[1..].iter().all(|page| page == "c"));
    assert_eq!(names(&queue), vec!["c"]);
}

#[tokio::test(start_paused = true)]
async fn flush_now_sends_back_to_back_with_checkpoints() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let backup = Arc::new(MemoryBackup::new());
    let queue = start(config(), transport.clone(), backup.clone());

    queue.add(TrackingEvent::new("one"));
    queue.add(TrackingEvent::new("two"));
    let flushed_at = tokio::time::Instant::now();
    queue.flush_now();

    eventually("queue drained", || queue.is_empty()).await;

    let records = transport.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].at, flushed_at);
    assert_eq!(records[1].at, flushed_at);
    assert_eq!(pages(&transport), vec!["one", "two"]);

    eventually("checkpoints written", || backup.saves() == 2).await;
    assert!(backup.contents().is_empty());
    assert!(!queue.status().flush_requested);
}

#[tokio::test(start_paused = true)]
async fn recoverable_failure_ends_flush_mode() {
    let transport = Arc::new(ScriptedTransport::new(
        vec![Err(DeliveryError::recoverable("timeout"))],
        Ok(()),
    ));
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("one"));
    queue.add(TrackingEvent::new("two"));
    queue.flush_now();

    eventually("first attempt failed", || queue.status().failed_sends == 1).await;
    let status = queue.status();
    assert!(!status.flush_requested);
    assert!(matches!(status.phase, SendPhase::Scheduled { .. }));

    eventually("queue drained", || queue.is_empty()).await;
    let records = transport.records();
    assert_eq!(records.len(), 3);
    assert!(records[1].at - records[0].at >= Duration::from_secs(5));
    assert!(records[2].at - records[1].at >= Duration::from_secs(180));
    assert_eq!(pages(&transport), vec!["one", "two"]);
}

#[tokio::test(start_paused = true)]
async fn flush_while_attempt_in_flight_stays_single_flight() {
    let transport =
        Arc::new(ScriptedTransport::always_ok().with_latency(Duration::from_secs(10)));
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("one"));
    queue.add(TrackingEvent::new("two"));
    queue.flush_now();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.status().phase, SendPhase::Attempting);

    queue.flush_now();
    queue.flush_now();

    eventually("queue drained", || queue.is_empty()).await;
    let records = transport.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].at - records[0].at >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn eviction_during_attempt_keeps_newer_events() {
    let transport =
        Arc::new(ScriptedTransport::always_ok().with_latency(Duration::from_secs(10)));
    let queue = start(
        QueueConfig {
            max_url_count: 2,
            ..config()
        },
        transport.clone(),
        Arc::new(MemoryBackup::new()),
    );

    queue.add(TrackingEvent::new("a"));
    queue.add(TrackingEvent::new("b"));
    queue.flush_now();
    sleep(Duration::from_secs(1)).await;

    // "a" is in flight and gets evicted by "c"
    queue.add(TrackingEvent::new("c"));
    assert_eq!(names(&queue), vec!["b", "c"]);

    eventually("queue drained", || queue.is_empty()).await;
    assert_eq!(pages(&transport), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn delivery_timeout_counts_as_recoverable_failure() {
    let transport =
        Arc::new(ScriptedTransport::always_ok().with_latency(Duration::from_secs(120)));
    let queue = start(
        QueueConfig {
            delivery_timeout_secs: 30,
            ..config()
        },
        transport.clone(),
        Arc::new(MemoryBackup::new()),
    );

    queue.add(TrackingEvent::new("slow"));
    queue.flush_now();

    eventually("attempt timed out", || queue.status().failed_sends == 1).await;
    assert_eq!(queue.item_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sending_but_keeps_events() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let backup = Arc::new(MemoryBackup::new());
    let queue = start(config(), transport.clone(), backup.clone());

    queue.add(TrackingEvent::new("kept"));
    queue.shutdown();
    queue.add(TrackingEvent::new("late"));
    queue.flush_now();

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.attempts(), 0);
    assert_eq!(names(&queue), vec!["kept", "late"]);
    assert_eq!(queue.status().phase, SendPhase::Shutdown);
    assert_eq!(backup.contents().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_in_flight_attempt_resolve() {
    let transport =
        Arc::new(ScriptedTransport::always_ok().with_latency(Duration::from_secs(10)));
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));

    queue.add(TrackingEvent::new("one"));
    queue.add(TrackingEvent::new("two"));
    queue.flush_now();
    sleep(Duration::from_secs(1)).await;
    queue.shutdown();

    eventually("shut down", || queue.status().phase == SendPhase::Shutdown).await;
    sleep(Duration::from_secs(3600)).await;

    assert_eq!(pages(&transport), vec!["one"]);
    assert_eq!(names(&queue), vec!["two"]);
}

#[tokio::test(start_paused = true)]
async fn restored_events_are_flushed_on_start() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let backup = Arc::new(MemoryBackup::with_events(vec![
        TrackingEvent::new("left-1"),
        TrackingEvent::new("left-2"),
    ]));
    let started = tokio::time::Instant::now();
    let queue = start(config(), transport.clone(), backup);

    eventually("queue drained", || queue.is_empty()).await;
    let records = transport.records();
    assert_eq!(pages(&transport), vec!["left-1", "left-2"]);
    assert!(records.iter().all(|r| r.at == started));
}

#[tokio::test(start_paused = true)]
async fn lifecycle_signals_checkpoint_and_flush() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let backup = Arc::new(MemoryBackup::new());
    let queue = start(config(), transport.clone(), backup.clone());
    let bridge = LifecycleBridge::new(queue.clone());

    queue.add(TrackingEvent::new("x"));
    bridge.handle(LifecycleSignal::MemoryWarning);
    assert_eq!(backup.saves(), 1);
    assert_eq!(backup.contents().len(), 1);
    assert_eq!(transport.attempts(), 0);

    let at = tokio::time::Instant::now();
    bridge.handle(LifecycleSignal::Background);
    eventually("queue drained", || queue.is_empty()).await;
    assert_eq!(transport.records()[0].at, at);
    eventually("empty store checkpointed", || backup.contents().is_empty()).await;
}

#[tokio::test(start_paused = true)]
async fn lifecycle_channel_forwards_terminate() {
    let transport = Arc::new(ScriptedTransport::always_ok());
    let queue = start(config(), transport.clone(), Arc::new(MemoryBackup::new()));
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    let listener = LifecycleBridge::new(queue.clone()).spawn(rx);

    queue.add(TrackingEvent::new("bye"));
    tx.send(LifecycleSignal::Terminate).await.unwrap();
    drop(tx);
    listener.await.unwrap();

    eventually("queue drained", || queue.is_empty()).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn backup_file_carries_events_to_next_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = QueueConfig::backup_path_for(dir.path(), "1234");
    let renderer = Arc::new(QueryRenderer::new("https://collector.example", "1234").unwrap());

    let offline = Arc::new(ScriptedTransport::always_failing(DeliveryError::recoverable(
        "offline",
    )));
    let first = SendQueueBuilder::<TrackingEvent>::new(config().with_backup_path(&path))
        .renderer(renderer.clone())
        .transport(offline)
        .build()
        .unwrap();
    first.add(TrackingEvent::new("p1"));
    first.add(TrackingEvent::new("p2"));
    first.on_terminate();
    first.shutdown();

    let online = Arc::new(ScriptedTransport::always_ok());
    let second = SendQueueBuilder::<TrackingEvent>::new(config().with_backup_path(&path))
        .renderer(renderer)
        .transport(online.clone())
        .build()
        .unwrap();

    eventually("restored queue drained", || second.is_empty()).await;
    assert_eq!(pages(&online), vec!["p1", "p2"]);
}
