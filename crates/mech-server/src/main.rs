//! mech server
//!
//! Main entry point: loads the configuration, wires the components together
//! and runs the background loop until interrupted.

mod api;
mod audit;
mod mech;
mod runtime;

use anyhow::{Context, Result};
use clap::Parser;
use mech::Mech;
use mech_config::MechConfig;
use mech_core::{SharedClock, SystemClock};
use mech_event_bus::EventBus;
use mech_transport::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Targets raised to debug by `--debug`
const DEBUG_FILTER: &str = "info,mech=debug,mech_server=debug,mech_control=debug,\
mech_poller=debug,mech_rules=debug,mech_directory=debug,mech_transport=debug,\
mech_config=debug,mech_event_bus=debug";

#[derive(Debug, Parser)]
#[command(name = "mech", version, about = "Control point coordination and rule dispatch")]
struct Cli {
    /// Configuration directory (holds mech.yaml)
    #[arg(short, long, env = "MECH_CONFIG", default_value = ".")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    info!("Starting mech");

    let config = MechConfig::load(&cli.config)
        .with_context(|| format!("cannot load configuration from {:?}", cli.config))?;

    let clock: SharedClock = Arc::new(SystemClock);
    let bus = Arc::new(EventBus::new());
    let _audit = audit::spawn_audit_log(&bus);

    let mech = Mech::from_config(&config, &cli.config, clock, bus);
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(
        config.http.timeout_secs,
    ))?);

    let (status_tx, status_rx) = watch::channel(mech.status());
    let listen = config.http.listen.clone();
    tokio::spawn(async move {
        if let Err(e) = api::serve(&listen, status_rx).await {
            error!(listen = %listen, error = %e, "Status endpoint failed");
        }
    });

    info!("mech is running");
    runtime::run(
        mech,
        transport,
        Duration::from_secs(config.timing.tick_secs),
        status_tx,
        shutdown_signal(),
    )
    .await;

    info!("Shutting down...");
    Ok(())
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug { DEBUG_FILTER } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
