use std::sync::Arc;

use clap::Parser;
use log::error;
use msm_protocol::management::instance::{SendOutcome, StartOutcome, StopOutcome};
use tokio::sync::Notify;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::lifecycle::SessionController;
use crate::monitor::{format_snapshot, LiveMonitor};
use crate::registry::InstanceRegistry;
use crate::session::{ScreenMultiplexer, SessionMultiplexer};
use crate::status::StatusAggregator;

mod cli;
mod config;
mod launch;
mod lifecycle;
mod monitor;
mod ports;
mod registry;
mod sampler;
mod session;
mod status;
mod storage;

fn init_logger() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let registry = Arc::new(InstanceRegistry::open_default()?);
    log::debug!("registry at {}", registry.servers_dir().display());
    let mux: Arc<dyn SessionMultiplexer> = Arc::new(ScreenMultiplexer::new());
    let timings = AppConfig::get().timings.clone();

    match cli.command {
        Commands::Start { name } => {
            let controller = SessionController::new(registry, mux, timings);
            let outcome = controller.start(&name).await?;
            match &outcome {
                StartOutcome::Started => println!("started '{}'", name),
                StartOutcome::AlreadyRunning => println!("'{}' is already running", name),
                StartOutcome::Failed { reason } => {
                    println!("failed to start '{}': {}", name, reason)
                }
            }
            Ok(outcome.exit_code())
        }
        Commands::Stop { name } => {
            let controller = SessionController::new(registry, mux, timings);
            match controller.stop(&name).await? {
                StopOutcome::Stopped { graceful: true } => println!("stopped '{}'", name),
                StopOutcome::Stopped { graceful: false } => {
                    println!("stopped '{}' (forced after timeout)", name)
                }
                StopOutcome::NotRunning => println!("'{}' is not running", name),
            }
            Ok(0)
        }
        Commands::Restart { name } => {
            let controller = SessionController::new(registry, mux, timings);
            let outcome = controller.restart(&name).await?;
            match &outcome.start {
                StartOutcome::Started => println!("restarted '{}'", name),
                StartOutcome::AlreadyRunning => println!("'{}' is already running", name),
                StartOutcome::Failed { reason } => {
                    println!("failed to restart '{}': {}", name, reason)
                }
            }
            Ok(outcome.exit_code())
        }
        Commands::Status { name: Some(name) } => {
            let aggregator = StatusAggregator::new(registry, mux);
            let snapshot = aggregator.snapshot(&name).await?;
            println!("{}", format_snapshot(&snapshot));
            Ok(0)
        }
        Commands::Status { name: None } | Commands::List => {
            let aggregator = StatusAggregator::new(registry, mux);
            let snapshots = aggregator.snapshot_all().await?;
            if snapshots.is_empty() {
                println!("no servers registered");
            }
            for snapshot in &snapshots {
                println!("{}", format_snapshot(snapshot));
            }
            Ok(0)
        }
        Commands::Monitor => {
            let aggregator = StatusAggregator::new(registry, mux);
            let monitor = LiveMonitor::new(aggregator, timings.monitor_interval());
            monitor.run(Arc::new(Notify::new())).await;
            Ok(0)
        }
        Commands::Send { name, line } => {
            let controller = SessionController::new(registry, mux, timings);
            match controller.send(&name, &line.join(" ")).await? {
                SendOutcome::Sent => println!("sent to '{}'", name),
                SendOutcome::NotRunning => println!("'{}' is not running", name),
            }
            Ok(0)
        }
        Commands::Tune {
            name,
            ram,
            cores,
            port,
            auto_port,
        } => {
            let port = if auto_port {
                Some(registry.next_free_port()?)
            } else {
                port
            };
            let updated = registry.update(&name, |config| {
                if let Some(ram) = ram {
                    config.ram_mb = ram;
                }
                if let Some(cores) = cores {
                    config.cores = cores;
                }
                if let Some(port) = port {
                    config.port = port;
                }
            })?;
            println!(
                "tuned '{}': {}MB RAM, {} cores, port {} (restart to apply)",
                name, updated.ram_mb, updated.cores, updated.port
            );
            Ok(0)
        }
    }
}
