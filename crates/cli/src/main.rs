//! `scm-events` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the JSON file named by `--config`, if any,
//!    and validate it.
//! 2. **Wire observability**: configure `tracing-subscriber` with a JSON layer
//!    and, when an endpoint is configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: seed an in-process source, register the
//!    probe listener, and start the dispatcher.
//! 4. **Run intake**: read one event per line from stdin, fire it (now or
//!    after its delay), and wait for every delivery before exiting.
//!
//! Exits non-zero if any delivery was not clean.

mod config;
mod input;
mod observability;
mod probe;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{info, warn};

use dispatch::{DeliveryReport, Dispatcher, ListenerRegistry};

use crate::config::CliConfig;
use crate::input::EventLine;
use crate::probe::Probe;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Reads one JSON event per line from stdin and delivers it to the listeners.
#[derive(Debug, Parser)]
#[command(name = "scm-events", version, about)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let telemetry = observability::init()?;
    let result = run(config).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "scm-events failed");
    }
    telemetry.shutdown();
    result
}

async fn run(config: CliConfig) -> anyhow::Result<()> {
    let source = Arc::new(config.build_source()?);
    info!(source = %config.source_name, heads = source.len(), "seeded source");

    let registry = Arc::new(ListenerRegistry::<Value>::new());
    registry.register(Arc::new(Probe::new(Arc::clone(&source))));
    let dispatcher =
        Dispatcher::new(config.dispatcher.clone(), Arc::clone(&registry)).context("starting dispatcher")?;

    let mut deliveries = Deliveries::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0_usize;
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        line_number += 1;
        deliveries.reap();
        if line.trim().is_empty() {
            continue;
        }
        let parsed = EventLine::parse(&line).and_then(|event_line| {
            let delay = event_line.delay();
            Ok((event_line.into_event()?, delay))
        });
        match parsed {
            Ok((event, Some(delay))) => deliveries.track(dispatcher.fire_later(event, delay)),
            Ok((event, None)) => deliveries.track(dispatcher.fire_now(event)),
            Err(err) => warn!(line = line_number, error = %err, "skipping unreadable event"),
        }
    }

    let unclean = deliveries.finish().await;
    registry.clear();
    info!(events = line_number, unclean, "intake finished");

    if unclean > 0 {
        bail!("{unclean} deliveries were not clean");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-flight deliveries
// ---------------------------------------------------------------------------

/// Deliveries still in flight, plus a count of the finished ones that were
/// not clean. Finished tasks are dropped as soon as they are reaped.
#[derive(Default)]
struct Deliveries {
    in_flight: JoinSet<Result<DeliveryReport, JoinError>>,
    unclean: usize,
}

impl Deliveries {
    fn track(&mut self, delivery: JoinHandle<DeliveryReport>) {
        self.in_flight.spawn(delivery);
    }

    /// Collects whatever has finished without waiting.
    fn reap(&mut self) {
        while let Some(done) = self.in_flight.try_join_next() {
            self.record(done);
        }
    }

    /// Waits for everything still in flight; returns the unclean count.
    async fn finish(mut self) -> usize {
        while let Some(done) = self.in_flight.join_next().await {
            self.record(done);
        }
        self.unclean
    }

    fn record(&mut self, done: Result<Result<DeliveryReport, JoinError>, JoinError>) {
        match done {
            Ok(Ok(report)) if report.is_clean() => {}
            Ok(Ok(_)) => self.unclean += 1,
            Ok(Err(err)) | Err(err) => {
                warn!(error = %err, "delivery task did not complete");
                self.unclean += 1;
            }
        }
    }
}
