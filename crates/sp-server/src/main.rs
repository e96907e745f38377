//! ShutterPilot server
//!
//! Loads the configuration, starts one controller per profile and keeps
//! them running until interrupted.
//!
//! ```text
//! shutterpilot [--simulate] [CONFIG]
//! ```
//!
//! The configuration path falls back to `SHUTTERPILOT_CONFIG`, then to
//! `shutterpilot.yaml` in the working directory. `SIGHUP` reloads it.

mod simulated;

use anyhow::{Context, Result};
use clap::Parser;
use sp_config::ShutterPilotConfig;
use sp_engine::{EngineContext, Supervisor};
use sp_event_bus::EventBus;
use sp_service_registry::ServiceRegistry;
use sp_state_store::StateStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "shutterpilot.yaml";

/// The running instance
pub struct ShutterPilot {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// Entity states
    pub states: Arc<StateStore>,
    /// Service registry for actuator commands
    pub services: Arc<ServiceRegistry>,
}

impl ShutterPilot {
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());

        Self { bus, states, services }
    }

    pub fn context(&self) -> EngineContext {
        EngineContext::new(self.bus.clone(), self.states.clone(), self.services.clone())
    }
}

impl Default for ShutterPilot {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-actuator shading automation
#[derive(Parser, Debug)]
#[command(name = "shutterpilot", version, about)]
struct Cli {
    /// Configuration file
    #[arg(env = "SHUTTERPILOT_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Drive simulated covers and lights instead of real devices
    #[arg(long)]
    simulate: bool,
}

fn load_config(path: &Path) -> Result<ShutterPilotConfig> {
    ShutterPilotConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

#[cfg(unix)]
async fn hangup(signal: &mut tokio::signal::unix::Signal) {
    signal.recv().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Cli::parse();
    info!(config = %args.config.display(), "Starting ShutterPilot");

    let config = load_config(&args.config)?;
    let pilot = ShutterPilot::new();

    if args.simulate {
        simulated::register_simulated_services(&pilot.services, pilot.states.clone());
        simulated::seed_entities(&pilot.states, &config);
    }

    let mut supervisor = Supervisor::start(pilot.context(), config);
    info!(profiles = ?supervisor.profiles(), "ShutterPilot is running");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sighup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
                _ = hangup(&mut sighup) => {
                    match load_config(&args.config) {
                        Ok(config) => {
                            if args.simulate {
                                simulated::seed_entities(&pilot.states, &config);
                            }
                            supervisor.reload(config).await;
                            info!(profiles = ?supervisor.profiles(), "Configuration reloaded");
                        }
                        Err(e) => error!("Keeping previous configuration: {e:#}"),
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    supervisor.shutdown().await;

    Ok(())
}
