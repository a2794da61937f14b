// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! sensorcap - IO-Link master polling daemon
//!
//! Polls every configured IO-Link master, stores decoded sensor values,
//! reports sensor topology changes and threshold violations.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sensorcap::audit::{AuditSink, DisabledAudit, EventStampCommand};
use sensorcap::config::StorageBackend;
use sensorcap::core::{HealthState, HttpConnector, PollContext, Supervisor};
use sensorcap::db::{DiscardSink, InfluxSink, PointSink};
use sensorcap::sensors::CodecRegistry;
use sensorcap::{Config, NAME, VERSION};

/// sensorcap - IO-Link master polling daemon
#[derive(Parser, Debug)]
#[command(name = "sensorcap")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Poll IO-Link masters, decode sensor data and raise threshold alerts")]
struct Args {
    /// TOML configuration file path
    #[arg(short, long, conflicts_with = "properties")]
    config: Option<PathBuf>,

    /// Legacy properties file instead of TOML
    #[arg(short, long)]
    properties: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check: bool,
}

fn init_logging(level: &str, log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(verbose)
        .with_line_number(verbose);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_ansi(true).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.properties {
        Some(path) => Config::from_properties_file(path)?,
        None => {
            let path = args.config.clone().unwrap_or_else(Config::default_path);
            Config::load_or_create(&path)?
        }
    };

    let level = if args.trace {
        "trace".to_string()
    } else if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    if let Some(file) = args.log_file {
        config.log_file = Some(file);
    }
    init_logging(&level, config.log_file.as_deref(), args.debug || args.trace)?;

    info!("{} v{} - IO-Link master polling daemon", NAME, VERSION);
    config.validate()?;

    if args.check {
        for device in &config.devices {
            let cadence = device.cadence();
            println!(
                "{}: {}:{} every {:?}, full poll every {} cycles",
                device.name,
                device.address,
                device.port,
                cadence.delay,
                cadence.iterations + 1
            );
        }
        println!("{} thresholds", config.thresholds.len());
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn build_storage(config: &Config) -> Result<Arc<dyn PointSink>> {
    let storage = &config.storage;
    let sink: Arc<dyn PointSink> = match storage.backend {
        StorageBackend::Influx => {
            let sink =
                InfluxSink::new(&storage.influx_url, &storage.database, config.http_timeout())?;
            if let Err(e) = sink.ensure_database().await {
                warn!("Cannot prepare InfluxDB database '{}': {}", storage.database, e);
            }
            Arc::new(sink)
        }
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            let sink = Arc::new(sensorcap::db::SqliteSink::open(&storage.sqlite_path)?);
            let cleaner = Arc::clone(&sink);
            let retention = storage.retention_days;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
                loop {
                    interval.tick().await;
                    if let Err(e) = cleaner.cleanup(retention) {
                        warn!("Point store cleanup failed: {}", e);
                    }
                }
            });
            sink
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => anyhow::bail!("built without the sqlite feature"),
        StorageBackend::Disabled => Arc::new(DiscardSink),
    };
    Ok(sink)
}

async fn run(config: Config) -> Result<()> {
    let storage = build_storage(&config).await?;
    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        Arc::new(EventStampCommand::new(
            &config.audit.program,
            config.audit.args.clone(),
            config.audit.timeout(),
        ))
    } else {
        Arc::new(DisabledAudit)
    };

    let ctx = PollContext {
        codecs: Arc::new(CodecRegistry::default()),
        thresholds: Arc::new(config.threshold_table()),
        storage,
        audit,
    };
    let supervisor = Arc::new(Supervisor::new(
        config.devices.clone(),
        config.supervisor.clone(),
        ctx,
        Arc::new(HttpConnector::new(config.http_timeout())),
    ));

    info!("Polling {} devices, press Ctrl+C to shutdown", config.devices.len());
    let mut runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, finishing current cycles...");
            supervisor.shutdown();
            (&mut runner).await?;
        }
        result = &mut runner => {
            result?;
            warn!("No device loop left running");
        }
    }

    for (name, health) in supervisor.health().read().await.iter() {
        match health.state {
            HealthState::Failed => warn!(
                "{}: failed ({})",
                name,
                health.last_error.as_deref().unwrap_or("unknown error")
            ),
            state => info!(
                "{}: {:?} after {} cycles, {} restarts",
                name, state, health.cycles, health.restarts
            ),
        }
    }

    info!("sensorcap shutdown complete");
    Ok(())
}
