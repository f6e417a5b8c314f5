use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_core::domain::TrackingEvent;
use courier_core::impls::{QueryRenderer, ScriptedTransport};
use courier_core::{LifecycleBridge, LifecycleSignal, QueueConfig, SendQueue, SendQueueBuilder};

/// Feed page-view events through a send queue against a simulated collector.
#[derive(Debug, Parser)]
#[command(name = "courier-cli", version)]
struct Args {
    /// QueueConfig as JSON (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of page-view events to enqueue
    #[arg(long, default_value_t = 10)]
    events: usize,

    /// Every K-th delivery fails recoverably (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,

    /// Backup file (in-memory only when omitted)
    #[arg(long)]
    backup: Option<PathBuf>,

    #[arg(long, default_value = "https://collector.example")]
    server: String,

    #[arg(long, default_value = "123451234512345")]
    tracking_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // (A) config: ファイル or デフォルト、フラグで上書き
    let mut config = match &args.config {
        Some(path) => QueueConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => QueueConfig::default(),
    };
    if let Some(path) = &args.backup {
        config = config.with_backup_path(path);
    }

    // (B) ports を組み立てて queue を起動（backup は config.backup_path から builder が選ぶ）
    let renderer = Arc::new(QueryRenderer::new(&args.server, &args.tracking_id)?);
    let transport = Arc::new(ScriptedTransport::always_ok().fail_every(args.fail_every));
    let queue = SendQueueBuilder::<TrackingEvent>::new(config)
        .renderer(renderer)
        .transport(transport.clone())
        .build()
        .context("starting send queue")?;

    let (signals, rx) = mpsc::channel(8);
    let bridge = LifecycleBridge::new(queue.clone()).spawn(rx);

    // (C) イベント投入 → flush
    for n in 0..args.events {
        queue.add(
            TrackingEvent::new(format!("page-{n}"))
                .with_param("cg1", "demo")
                .with_param("seq", n.to_string()),
        );
    }
    info!(item_count = queue.item_count(), "events enqueued, flushing");
    queue.flush_now();

    // (D) 空になるまで待つ。Ctrl-C は Terminate として伝える
    tokio::select! {
        _ = wait_until_drained(&queue) => info!("send queue drained"),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            signals.send(LifecycleSignal::Terminate).await?;
        }
    }

    // (E) 停止
    drop(signals);
    bridge.await?;
    queue.shutdown();

    info!(attempts = transport.attempts(), "collector calls");
    println!("{}", serde_json::to_string_pretty(&queue.status())?);
    Ok(())
}

async fn wait_until_drained(queue: &SendQueue<TrackingEvent>) {
    while !queue.is_empty() {
        sleep(Duration::from_millis(50)).await;
    }
}
