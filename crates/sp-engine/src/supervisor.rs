//! Owner of all profile controllers
//!
//! The supervisor starts one [`ControllerHandle`] per configured profile,
//! routes manual actions to them by profile name, holds the shared global
//! auto switch and replaces every controller on reload.

use sp_config::{GlobalSettings, ShutterPilotConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::EngineContext;
use crate::controller::{ControllerHandle, ManualCommand};
use crate::error::{SupervisorError, SupervisorResult};
use crate::status::{ProfileSnapshot, StatusSubscription};

pub struct Supervisor {
    ctx: EngineContext,
    global: GlobalSettings,
    global_auto: Arc<AtomicBool>,
    controllers: BTreeMap<String, ControllerHandle>,
}

impl Supervisor {
    /// Start a controller for every profile in `config`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(ctx: EngineContext, config: ShutterPilotConfig) -> Self {
        let mut supervisor = Self {
            global_auto: Arc::new(AtomicBool::new(config.global.global_auto)),
            global: config.global.clone(),
            controllers: BTreeMap::new(),
            ctx,
        };
        supervisor.spawn_all(config);
        supervisor
    }

    fn spawn_all(&mut self, config: ShutterPilotConfig) {
        self.global = config.global;
        self.global_auto
            .store(self.global.global_auto, Ordering::SeqCst);

        for profile in config.profiles {
            let name = profile.name.clone();
            let handle = ControllerHandle::spawn(
                profile,
                &self.global,
                self.global_auto.clone(),
                self.ctx.clone(),
            );
            self.controllers.insert(name, handle);
        }

        info!(
            profiles = self.controllers.len(),
            global_auto = self.global.global_auto,
            "Controllers started"
        );
    }

    /// Names of all running profiles, sorted
    pub fn profiles(&self) -> Vec<&str> {
        self.controllers.keys().map(String::as_str).collect()
    }

    pub fn global_auto(&self) -> bool {
        self.global_auto.load(Ordering::SeqCst)
    }

    /// Switch automation on or off for every profile and re-evaluate all
    pub fn set_global_auto(&self, enabled: bool) {
        let previous = self.global_auto.swap(enabled, Ordering::SeqCst);
        if previous == enabled {
            return;
        }
        info!(enabled, "Global auto switched");
        self.evaluate_all();
    }

    /// Queue a re-evaluation of every profile
    pub fn evaluate_all(&self) {
        for handle in self.controllers.values() {
            if let Err(e) = handle.evaluate() {
                warn!(error = %e, "Could not queue evaluation");
            }
        }
    }

    /// Queue a re-evaluation of one profile
    pub fn evaluate(&self, profile: &str) -> SupervisorResult<()> {
        self.controller(profile)?.evaluate()
    }

    pub async fn open(&self, profile: &str) -> SupervisorResult<()> {
        self.command(profile, ManualCommand::Open).await
    }

    pub async fn stop(&self, profile: &str) -> SupervisorResult<()> {
        self.command(profile, ManualCommand::Stop).await
    }

    pub async fn close_respecting_rules(&self, profile: &str) -> SupervisorResult<()> {
        self.command(profile, ManualCommand::CloseRespectingRules)
            .await
    }

    pub async fn command(&self, profile: &str, command: ManualCommand) -> SupervisorResult<()> {
        self.controller(profile)?.command(command).await
    }

    /// Latest snapshot of a profile
    pub fn snapshot(&self, profile: &str) -> Option<ProfileSnapshot> {
        self.ctx.status.latest(profile)
    }

    /// Latest snapshot of every running profile
    pub fn snapshots(&self) -> Vec<ProfileSnapshot> {
        self.ctx
            .status
            .all_latest()
            .into_iter()
            .filter(|s| self.controllers.contains_key(&s.profile))
            .collect()
    }

    pub fn subscribe(&self) -> StatusSubscription {
        self.ctx.status.subscribe()
    }

    /// Replace the configuration, restarting every controller
    pub async fn reload(&mut self, config: ShutterPilotConfig) {
        info!(profiles = config.profiles.len(), "Reloading configuration");
        self.stop_all().await;
        self.spawn_all(config);
    }

    /// Stop every controller and wait for them to release their resources
    pub async fn shutdown(&mut self) {
        self.stop_all().await;
        info!("Supervisor stopped");
    }

    async fn stop_all(&mut self) {
        let controllers = std::mem::take(&mut self.controllers);
        for (name, handle) in controllers {
            handle.shutdown().await;
            self.ctx.status.forget(&name);
        }
    }

    fn controller(&self, profile: &str) -> SupervisorResult<&ControllerHandle> {
        self.controllers
            .get(profile)
            .ok_or_else(|| SupervisorError::UnknownProfile(profile.to_string()))
    }
}
