//! onscreen: drives the scheduler against a simulated scrolling viewport.
//!
//! Items are fetched by a latency-only transport and sepia-toned. Every state
//! change is printed; item counts are printed at the end.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use onscreen_core::domain::{ItemId, Manifest, ManifestEntry, ViewportEvent};
use onscreen_core::impls::{
    ChannelStateSink, JsonManifestLoader, SepiaTransform, SimulatedTransport, StaticManifestLoader,
};
use onscreen_core::ports::ManifestLoader;
use onscreen_core::{AppBuilder, SchedulerConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Simulated photo list: only what is on screen gets fetched and transformed.
#[derive(Parser, Debug)]
#[command(name = "onscreen", version, about)]
struct Cli {
    /// JSON manifest: `{ "name": "http://..." }`. A generated list is used if omitted.
    #[arg(long)]
    manifest: Option<String>,

    /// Item count for the generated list.
    #[arg(long, default_value_t = 40)]
    items: u64,

    /// Scheduler config JSON file.
    #[arg(long)]
    config: Option<String>,

    /// Visible rows.
    #[arg(long, default_value_t = 6)]
    window: u64,

    /// Number of scroll gestures.
    #[arg(long, default_value_t = 5)]
    scrolls: u64,

    /// Rows moved per scroll gesture.
    #[arg(long, default_value_t = 4)]
    step: u64,

    /// Simulated fetch latency.
    #[arg(long, default_value_t = 150)]
    latency_ms: u64,

    /// Random extra latency, up to this much.
    #[arg(long, default_value_t = 100)]
    jitter_ms: u64,

    /// Time the viewport rests between gestures.
    #[arg(long, default_value_t = 250)]
    dwell_ms: u64,
}

fn generated_manifest(n: u64) -> Manifest {
    (0..n)
        .map(|i| {
            ManifestEntry::new(
                format!("photo-{i:03}"),
                format!("https://photos.example/{i:03}.rgb"),
            )
        })
        .collect()
}

fn window(offset: u64, rows: u64, total: u64) -> HashSet<ItemId> {
    (offset..(offset + rows).min(total)).map(ItemId::new).collect()
}

/// Initial window, then `scrolls` gestures of motion and settle.
async fn scroll(tx: mpsc::Sender<ViewportEvent>, cli: Cli, total: u64) {
    let dwell = Duration::from_millis(cli.dwell_ms);
    let mut offset = 0;

    let visible = window(offset, cli.window, total);
    if tx.send(ViewportEvent::VisibleChanged { visible }).await.is_err() {
        return;
    }

    for _ in 0..cli.scrolls {
        tokio::time::sleep(dwell).await;
        if tx.send(ViewportEvent::MotionStarted).await.is_err() {
            return;
        }
        tokio::time::sleep(dwell / 4).await;

        offset = (offset + cli.step).min(total.saturating_sub(cli.window));
        info!(offset, "settled");
        let visible = window(offset, cli.window, total);
        if tx.send(ViewportEvent::MotionSettled { visible }).await.is_err() {
            return;
        }
    }
    tokio::time::sleep(dwell).await;
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)
            .await
            .with_context(|| format!("loading config {path}"))?,
        None => SchedulerConfig::default_v1(),
    };
    info!(?config, "config");

    let (sink, mut changes) = ChannelStateSink::new();
    let printer = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            println!(
                "{}  {:<10} {}",
                change.at.format("%H:%M:%S%.3f"),
                change.item,
                change.state
            );
        }
    });

    let transport = SimulatedTransport::new(
        Duration::from_millis(cli.latency_ms),
        Duration::from_millis(cli.jitter_ms),
    );
    let mut app = AppBuilder::new()
        .config(config)
        .transport(Arc::new(transport))
        .engine(Arc::new(SepiaTransform::default()))
        .sink(Arc::new(sink))
        .build()?;

    let loader: Box<dyn ManifestLoader> = match &cli.manifest {
        Some(path) => Box::new(JsonManifestLoader::from_path(path)),
        None => Box::new(StaticManifestLoader::new(generated_manifest(cli.items))),
    };
    let total = app
        .scheduler_mut()
        .load_manifest(loader.as_ref())
        .await
        .context("loading manifest")? as u64;

    let (tx, rx) = mpsc::channel(16);
    let viewport = tokio::spawn(scroll(tx, cli, total));

    app.run(rx).await;
    viewport.await?;
    app.run_until_idle().await;

    let counts = app.scheduler().counts();
    println!("{}", serde_json::to_string_pretty(&counts)?);

    app.shutdown().await;
    printer.await?;
    Ok(())
}
