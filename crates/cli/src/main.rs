//! exprog CLI - simulate a batch export and stream its progress.
//!
//! Stands in for a real export engine: runs a fake job against the
//! in-memory store, reporting progress per item, and prints every
//! notification that crosses the report threshold.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, Level};
use ulid::Ulid;

use exprog_core::{JobIdentity, Notification};
use exprog_progress::{ChannelSink, ProgressReporter};
use exprog_storage::MemoryStore;

#[derive(Parser)]
#[command(name = "exprog")]
#[command(about = "Simulate a batch export with live progress and ETA", long_about = None)]
struct Cli {
    /// Number of items the fake export processes
    #[arg(long, default_value = "500")]
    items: i64,

    /// Optional subject the job is scoped to
    #[arg(long)]
    subject: Option<String>,

    /// Milliseconds of simulated work per item
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Fail the job partway through instead of completing
    #[arg(long)]
    fail_at: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let cli = Cli::parse();

    let uuid = Ulid::new().to_string();
    let id = match &cli.subject {
        Some(subject) => JobIdentity::with_subject(uuid, subject.as_str()),
        None => JobIdentity::new(uuid),
    };

    let (tx, mut rx) = mpsc::channel::<Notification>(64);
    let printer = tokio::spawn(async move {
        while let Some(note) = rx.recv().await {
            match serde_json::to_string(&note) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("unprintable notification: {}", err),
            }
        }
    });

    let store = Arc::new(MemoryStore::new());
    let reporter = ProgressReporter::new(store, Arc::new(ChannelSink::new(tx)));

    info!(job = %id, items = cli.items, "starting simulated export");
    reporter.on_job_start(&id).await?;

    for item in 1..=cli.items {
        if cli.fail_at == Some(item) {
            reporter.on_job_failed(&id, "simulated failure").await?;
            drop(reporter);
            printer.await?;
            anyhow::bail!("export failed at item {}", item);
        }

        tokio::time::sleep(std::time::Duration::from_millis(cli.tick_ms)).await;
        reporter.on_unit_completed(&id).await?;
        reporter.report_progress(&id, cli.items).await?;
    }

    let url = format!("file:///tmp/export-{}.csv", id.uuid);
    reporter.on_job_completed(&id, &url).await?;
    info!(job = %id, url = %url, "export finished");

    // Drop the reporter so the channel closes and the printer drains.
    drop(reporter);
    printer.await?;

    Ok(())
}
