// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! spumotion - headless motion sensor monitor
//!
//! Runs discovery against the configured registry backend, reports what
//! was found, and streams samples to stdout until Ctrl+C or `--duration`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use spumotion::config::RegistryBackend;
use spumotion::discovery::dump_tree;
use spumotion::{Change, Config, DeviceRegistry, MemoryRegistry, MotionEngine, SysfsRegistry, VERSION};

/// spumotion - motion sensor discovery and monitoring
#[derive(Parser, Debug)]
#[command(name = "spumotion")]
#[command(version = VERSION)]
#[command(about = "Discover motion sensors in the device registry and stream their samples")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging (dumps inspected property trees)
    #[arg(long)]
    trace: bool,

    /// Read the registry from a JSON snapshot
    #[arg(long, conflicts_with = "sysfs")]
    snapshot: Option<PathBuf>,

    /// Read the registry from a sysfs device directory
    #[arg(long)]
    sysfs: Option<PathBuf>,

    /// Polling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    duration: Option<u64>,

    /// Print every Nth sample
    #[arg(long, default_value = "30")]
    print_every: u64,

    /// Print the property tree of a service and exit
    #[arg(long, value_name = "SERVICE")]
    dump: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🧭 spumotion v{}", VERSION);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if let Some(path) = &args.snapshot {
        config.registry.backend = RegistryBackend::Snapshot;
        config.registry.snapshot_path = Some(path.clone());
    }
    if let Some(root) = &args.sysfs {
        config.registry.backend = RegistryBackend::Sysfs;
        config.registry.sysfs_root = root.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.polling.interval_ms = interval_ms;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);
    info!("Registry backend: {:?}", config.registry.backend);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args))
}

fn open_registry(config: &Config) -> Result<Arc<dyn DeviceRegistry>> {
    let registry: Arc<dyn DeviceRegistry> = match config.registry.backend {
        RegistryBackend::Snapshot => {
            let path = config
                .registry
                .snapshot_path
                .as_ref()
                .context("snapshot backend selected but registry.snapshot_path is not set")?;
            Arc::new(MemoryRegistry::from_snapshot(path)?)
        }
        RegistryBackend::Sysfs => {
            let registry = SysfsRegistry::new(config.registry.sysfs_root.clone());
            info!("Reading sysfs devices under {:?}", registry.root());
            Arc::new(registry)
        }
    };
    Ok(registry)
}

/// Print one service's property tree
fn dump_service(registry: &dyn DeviceRegistry, service: &str) -> Result<()> {
    let mut handle = registry.require_service(service)?;
    let properties = registry.read_properties(&handle);
    registry.release(&mut handle);

    println!("{}:", service);
    print!("{}", dump_tree(&properties?));
    Ok(())
}

async fn run(config: Config, args: Args) -> Result<()> {
    let registry = open_registry(&config)?;

    if let Some(service) = &args.dump {
        return dump_service(registry.as_ref(), service);
    }

    let engine = MotionEngine::new(registry, Arc::new(config))?;
    let discovery = engine.discovery();

    println!("Status: {}", engine.status_message());
    for candidate in &discovery.candidates {
        println!(
            "  candidate {} ({:?}): readable={} sensor subtree={} keys={:?}",
            candidate.service,
            candidate.source,
            candidate.readable,
            candidate.has_sensor_subtree,
            candidate.matching_keys
        );
    }

    match discovery.require_sensor() {
        Ok(properties) => info!("Sensor subtree has {} entries", properties.len()),
        Err(e) => {
            warn!("{}", e);
            engine.start_monitoring();
            println!("Status: {}", engine.status_message());
            return Ok(());
        }
    }

    let print_every = args.print_every.max(1);
    let subscription = engine.subscribe(move |change, snapshot| match change {
        Change::Status => println!("Status: {}", snapshot.status_message()),
        Change::Sample => {
            if let Some(sample) = snapshot.sample.filter(|s| s.sequence % print_every == 0) {
                let [ax, ay, az] = sample.accel();
                let [gx, gy, gz] = sample.gyro();
                println!(
                    "#{:<6} {} accel [{:+.3} {:+.3} {:+.3}] |a| {:.3} gyro [{:+.3} {:+.3} {:+.3}]",
                    sample.sequence,
                    sample.timestamp.format("%H:%M:%S%.3f"),
                    ax, ay, az,
                    sample.accel_magnitude(),
                    gx, gy, gz
                );
            }
        }
    });

    engine.start_monitoring();
    info!("🚀 Monitoring, press Ctrl+C to stop");

    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                result = tokio::signal::ctrl_c() => result?,
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    info!("Shutdown signal received, cleaning up...");
    engine.stop_monitoring();
    engine.unsubscribe(&subscription);
    drop(engine);

    info!("spumotion shutdown complete");
    Ok(())
}
