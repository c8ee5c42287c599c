//! observability-pipeline demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   counters                              log
//!   ────────                              ───
//!   MetricRegistry                        PipelineConfig (file or demo)
//!     │ create_category                     │
//!     ▼                                     ▼
//!   Simulator ──increment──▶ counters     LogRouter ──▶ flat / rolling / xml / event log
//!     │                         │           ▲
//!   Sampler ◀──snapshot/rate────┘           │ (--repeat-secs)
//!     │                                   QueuedWriter ◀── ConfigWatcher reconfigure
//!     ▼
//!   tracing + optional Prometheus exporter
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;

use observability_pipeline::config::{load_config, ConfigWatcher, PipelineConfig};
use observability_pipeline::counters::{CounterKind, CounterSpec, MetricRegistry, RateCounter};
use observability_pipeline::driver::{Sampler, Simulator};
use observability_pipeline::lifecycle::Shutdown;
use observability_pipeline::observability::{init_exporter, init_tracing};
use observability_pipeline::pipeline::{queue, LogEntry, LogRouter, Severity};

const RATE_COUNTER: &str = "Orders/Sec";
const TOTAL_COUNTER: &str = "TotalOrders";

#[derive(Parser)]
#[command(name = "observability-pipeline")]
#[command(about = "Counters with derived rates and a category-routed logging pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file. Without one the built-in demo layout is used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the demo layout's log files.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a counter category, simulate activity and sample it until stopped
    Counters {
        /// Stop after this many seconds instead of waiting for Enter
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Write a log entry through the configured sinks
    Log {
        #[arg(default_value = "Testing")]
        message: String,

        #[arg(short, long, default_value = "error")]
        severity: Severity,

        /// Categories to route to; defaults to every configured category
        #[arg(short = 'C', long = "category")]
        categories: Vec<String>,

        /// Keep writing every N seconds through the queued writer until Ctrl-C
        #[arg(long)]
        repeat_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::demo(&cli.log_dir),
    };
    init_tracing(&config.observability.log_level);

    tracing::info!(
        config = ?cli.config,
        sinks = config.sinks.len(),
        categories = config.categories.len(),
        "observability-pipeline v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Counters { duration_secs } => {
            run_counters(&config, duration_secs.map(Duration::from_secs)).await
        }
        Commands::Log {
            message,
            severity,
            categories,
            repeat_secs,
        } => {
            let router = Arc::new(LogRouter::from_config(&config)?);
            let categories = if categories.is_empty() {
                router.categories()
            } else {
                categories
            };
            match repeat_secs {
                None => write_once(&router, &message, severity, &categories),
                Some(secs) => {
                    let request = LogRequest {
                        message,
                        severity,
                        categories,
                    };
                    run_log_loop(router, request, Duration::from_secs(secs.max(1)), cli.config)
                        .await
                }
            }
        }
    }
}

async fn run_counters(
    config: &PipelineConfig,
    duration: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &config.metrics;
    let registry = Arc::new(MetricRegistry::new());

    // A leftover category means an earlier run died; start clean.
    if registry.category_exists(&settings.category) {
        registry.delete_category(&settings.category)?;
    }
    let handles = registry.create_category(
        &settings.category,
        "Simulated order activity",
        &[
            CounterSpec::new(RATE_COUNTER, CounterKind::RatePerSecond),
            CounterSpec::new(TOTAL_COUNTER, CounterKind::Total),
        ],
    )?;

    if settings.exporter_enabled {
        let addr: SocketAddr = settings.exporter_address.parse()?;
        init_exporter(addr)?;
    }

    let shutdown = Shutdown::new();
    let simulator = tokio::spawn(
        Simulator::new(registry.clone(), handles.clone()).run(shutdown.subscribe()),
    );
    let rates = vec![RateCounter::new(
        handles[0].clone(),
        Duration::from_millis(settings.rate_window_ms),
    )];
    let sampler = tokio::spawn(
        Sampler::new(
            registry.clone(),
            rates,
            Duration::from_millis(settings.sample_interval_ms),
        )
        .with_publish(settings.exporter_enabled)
        .run(shutdown.subscribe()),
    );

    println!("======================================================================");
    println!("  Counters live in category \"{}\"", settings.category);
    match duration {
        Some(d) => println!("  Running for {} s (Ctrl-C to stop early)", d.as_secs()),
        None => println!("  Hit Enter to stop"),
    }
    println!("======================================================================");

    wait_for_stop(duration).await;
    shutdown.trigger();

    let ticks = simulator.await??;
    let samples = sampler.await?;
    registry.delete_category(&settings.category)?;

    tracing::info!(ticks, samples, "counter demo finished");
    Ok(())
}

async fn wait_for_stop(duration: Option<Duration>) {
    match duration {
        Some(d) => {
            tokio::select! {
                _ = tokio::time::sleep(d) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            tokio::select! {
                _ = lines.next_line() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
}

struct LogRequest {
    message: String,
    severity: Severity,
    categories: Vec<String>,
}

impl LogRequest {
    fn entry(&self) -> Result<LogEntry, Box<dyn std::error::Error>> {
        Ok(build_entry(&self.message, self.severity, &self.categories)?)
    }
}

fn build_entry(
    message: &str,
    severity: Severity,
    categories: &[String],
) -> Result<LogEntry, observability_pipeline::pipeline::EntryError> {
    LogEntry::builder(message)
        .severity(severity)
        .categories(categories.iter().cloned())
        .property("ActivityId", uuid::Uuid::new_v4().to_string())
        .build()
}

fn write_once(
    router: &LogRouter,
    message: &str,
    severity: Severity,
    categories: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    if !router.is_logging_enabled() {
        tracing::info!("logging disabled, nothing written");
        return Ok(());
    }

    let entry = build_entry(message, severity, categories)?;
    match router.write(&entry) {
        Ok(()) => {
            tracing::info!(categories = ?entry.categories(), "entry written");
            Ok(())
        }
        Err(e) if e.delivered > 0 => {
            eprintln!("partial failure: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_log_loop(
    router: Arc<LogRouter>,
    request: LogRequest,
    every: Duration,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (writer, worker) = queue::spawn(router.clone(), 1024)?;

    let (_watcher, mut updates) = match config_path.as_deref() {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(rx))
        }
        None => (None, None),
    };

    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                writer.submit(request.entry()?).await?;
            }
            Some(config) = next_update(&mut updates) => {
                if let Err(e) = router.reconfigure(&config) {
                    tracing::error!(error = %e, "reconfigure rejected, keeping current routes");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(writer);
    let stats = tokio::task::spawn_blocking(move || worker.join()).await?;
    tracing::info!(written = stats.written, failed = stats.failed, "log writer drained");
    Ok(())
}

async fn next_update(
    updates: &mut Option<tokio::sync::mpsc::UnboundedReceiver<PipelineConfig>>,
) -> Option<PipelineConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
