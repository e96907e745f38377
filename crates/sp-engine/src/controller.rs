//! Profile controller
//!
//! One controller drives one cover. It runs as its own Tokio task and owns
//! all per-profile runtime state: the brightness latch, the cooldown, the
//! self-move guard and the last commands it issued. Every input (state
//! changes, sunrise and sunset, the safety tick, timers, manual commands)
//! arrives as a [`ControllerEvent`] on a single channel, so events for one
//! profile are handled strictly one after another in arrival order.

use chrono::Utc;
use sp_config::{GlobalSettings, ProfileConfig};
use sp_core::domains::sun;
use sp_core::events::StateChangedData;
use sp_core::{EntityId, State};
use sp_event_bus::ListenerHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::context::EngineContext;
use crate::cooldown::Cooldown;
use crate::dispatch::{close_with_fallback, open_with_fallback};
use crate::error::{CommandError, SupervisorError, SupervisorResult};
use crate::guard::{SelfMoveGuard, WarnThrottle};
use crate::latch::Latch;
use crate::policy::{self, CoverAction, LightAction, PolicyInput};
use crate::schedule::{self, TimerHandle};
use crate::sensors::DoorState;
use crate::status::{ProfileSnapshot, Reason, Status};

/// Position change, in points, that counts as someone moving the cover by hand
pub const MANUAL_CHANGE_THRESHOLD: i64 = 2;

/// Minimum spacing of "actuator not found" warnings
pub const ACTUATOR_WARN_PERIOD: Duration = Duration::from_secs(60);

/// Manual actions accepted by a running controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCommand {
    Open,
    Stop,
    /// Close, but never below the door-safe or ventilation position while
    /// the door or window is open
    CloseRespectingRules,
}

#[derive(Debug)]
enum ControllerEvent {
    SensorChanged {
        entity_id: EntityId,
        old: Option<State>,
        new: Option<State>,
    },
    CoverChanged {
        old: Option<State>,
        new: Option<State>,
    },
    Sunrise,
    Sunset,
    Tick,
    CooldownExpired(u64),
    CooldownTick,
    DailyReset,
    Evaluate,
    Command(ManualCommand, oneshot::Sender<Result<(), CommandError>>),
    Shutdown,
}

type EventSender = mpsc::UnboundedSender<ControllerEvent>;

/// Handle to a running profile controller
pub struct ControllerHandle {
    name: String,
    tx: EventSender,
    task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Start a controller for `profile`
    ///
    /// Subscriptions and schedules are in place when this returns. Must be
    /// called from within a Tokio runtime.
    pub fn spawn(
        profile: ProfileConfig,
        settings: &GlobalSettings,
        global_auto: Arc<AtomicBool>,
        ctx: EngineContext,
    ) -> Self {
        let name = profile.name.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut controller = ProfileController::new(Arc::new(profile), global_auto, ctx, tx.clone());
        controller.subscribe(settings);
        let task = tokio::spawn(controller.run(rx));

        Self {
            name,
            tx,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Queue a re-evaluation
    pub fn evaluate(&self) -> SupervisorResult<()> {
        self.send(ControllerEvent::Evaluate)
    }

    pub async fn open(&self) -> SupervisorResult<()> {
        self.command(ManualCommand::Open).await
    }

    pub async fn stop(&self) -> SupervisorResult<()> {
        self.command(ManualCommand::Stop).await
    }

    pub async fn close_respecting_rules(&self) -> SupervisorResult<()> {
        self.command(ManualCommand::CloseRespectingRules).await
    }

    /// Run a manual action and wait for its outcome
    pub async fn command(&self, command: ManualCommand) -> SupervisorResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.send(ControllerEvent::Command(command, reply))?;
        outcome
            .await
            .map_err(|_| SupervisorError::ControllerStopped(self.name.clone()))?
            .map_err(|source| SupervisorError::Command {
                profile: self.name.clone(),
                source,
            })
    }

    /// Stop the controller and wait until its timers and subscriptions are released
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(ControllerEvent::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(profile = %self.name, error = %e, "Controller task failed");
                }
            }
        }
    }

    fn send(&self, event: ControllerEvent) -> SupervisorResult<()> {
        self.tx
            .send(event)
            .map_err(|_| SupervisorError::ControllerStopped(self.name.clone()))
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ProfileController {
    profile: Arc<ProfileConfig>,
    global_auto: Arc<AtomicBool>,
    ctx: EngineContext,
    tx: EventSender,

    latch: Latch,
    cooldown: Cooldown,
    guard: SelfMoveGuard,
    actuator_warning: WarnThrottle,
    last_known_position: Option<i64>,
    last_command: Option<CoverAction>,
    last_light: Option<LightAction>,
    status: Status,
    reason: Reason,

    listeners: Vec<ListenerHandle>,
    timers: Vec<TimerHandle>,
}

impl ProfileController {
    fn new(
        profile: Arc<ProfileConfig>,
        global_auto: Arc<AtomicBool>,
        ctx: EngineContext,
        tx: EventSender,
    ) -> Self {
        let last_known_position = ctx
            .sensors
            .read_state(&profile.cover)
            .and_then(|s| s.current_position());

        Self {
            profile,
            global_auto,
            ctx,
            tx,
            latch: Latch::Idle,
            cooldown: Cooldown::new(),
            guard: SelfMoveGuard::new(),
            actuator_warning: WarnThrottle::new(ACTUATOR_WARN_PERIOD),
            last_known_position,
            last_command: None,
            last_light: None,
            status: Status::Active,
            reason: Reason::Initialization,
            listeners: Vec::new(),
            timers: Vec::new(),
        }
    }

    /// Register state listeners and schedules that feed the event channel
    fn subscribe(&mut self, settings: &GlobalSettings) {
        let profile = &self.profile;

        if let Some(area) = profile.area.as_ref() {
            if area.is_brightness_mode() && area.brightness_sensor.is_none() {
                warn!(
                    profile = %profile.name,
                    area = %area.id,
                    "Area is in brightness mode but has no brightness sensor"
                );
            }
        }

        let mut tracked = profile.watched_sensors();
        tracked.push(profile.cover.clone());
        let sun_entity: Option<EntityId> = sun::ENTITY_ID.parse().ok();
        tracked.extend(sun_entity);

        let cover = profile.cover.clone();
        let tx = self.tx.clone();
        self.listeners.push(self.ctx.bus.track_state_change(&tracked, move |event| {
            if let Some(event) = classify(&cover, event.data) {
                let _ = tx.send(event);
            }
        }));

        let tx = self.tx.clone();
        self.timers.push(schedule::every(settings.tick_interval, move || {
            let _ = tx.send(ControllerEvent::Tick);
        }));

        let tx = self.tx.clone();
        self.timers.push(schedule::daily_at(
            self.ctx.clock.clone(),
            settings.daily_reset,
            move || {
                let _ = tx.send(ControllerEvent::DailyReset);
            },
        ));

        debug!(
            profile = %profile.name,
            entities = tracked.len(),
            tick_secs = settings.tick_interval.as_secs(),
            daily_reset = %settings.daily_reset,
            "Controller subscribed"
        );
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControllerEvent>) {
        info!(profile = %self.profile.name, cover = %self.profile.cover, "Profile controller started");
        self.set_status(Status::Active, Reason::Initialization);
        self.evaluate().await;

        while let Some(event) = rx.recv().await {
            if matches!(event, ControllerEvent::Shutdown) {
                break;
            }
            self.handle(event).await;
        }

        self.release();
        info!(profile = %self.profile.name, "Profile controller stopped");
    }

    async fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::SensorChanged { entity_id, old, new } => {
                self.sensor_changed(entity_id, old, new).await
            }
            ControllerEvent::CoverChanged { old, new } => {
                if self.cover_changed(old.as_ref(), new.as_ref()) {
                    self.evaluate().await;
                }
            }
            sun_event @ (ControllerEvent::Sunrise | ControllerEvent::Sunset) => {
                debug!(profile = %self.profile.name, event = ?sun_event, "Sun event");
                self.evaluate().await;
            }
            ControllerEvent::Tick | ControllerEvent::Evaluate => self.evaluate().await,
            ControllerEvent::CooldownExpired(generation) => {
                if self.cooldown.expire(generation) {
                    info!(profile = %self.profile.name, "Cooldown expired");
                    self.forget_commands();
                    self.set_status(Status::Active, Reason::CooldownExpired);
                    self.evaluate().await;
                }
            }
            ControllerEvent::CooldownTick => {
                if self.cooldown.is_set() {
                    self.publish();
                }
            }
            ControllerEvent::DailyReset => self.daily_reset().await,
            ControllerEvent::Command(command, reply) => {
                let outcome = self.manual(command).await;
                if let Err(e) = &outcome {
                    warn!(profile = %self.profile.name, command = ?command, error = %e, "Manual command failed");
                }
                let _ = reply.send(outcome);
            }
            ControllerEvent::Shutdown => {}
        }
    }

    async fn sensor_changed(&mut self, entity_id: EntityId, old: Option<State>, new: Option<State>) {
        let is_door = self.profile.door_sensor.as_ref() == Some(&entity_id);
        if is_door && old.as_ref().map(|s| &s.state) != new.as_ref().map(|s| &s.state) {
            debug!(profile = %self.profile.name, door = %entity_id, "Door changed");
            self.forget_commands();
        }

        let is_window = self.profile.window_sensor.as_ref() == Some(&entity_id);
        if !is_window {
            self.evaluate().await;
            return;
        }

        let was_open = old.as_ref().is_some_and(State::is_on);
        let is_open = new.as_ref().is_some_and(State::is_on);

        match (was_open, is_open) {
            (true, false) => {
                info!(profile = %self.profile.name, window = %entity_id, "Window closed");
                self.forget_commands();
                if self.automation_enabled() && self.arm_cooldown() {
                    self.set_status(Status::Cooldown, Reason::WindowClosedCooldown);
                }
                self.evaluate().await;
            }
            (false, true) => {
                if self.cooldown.is_set() {
                    debug!(profile = %self.profile.name, "Window reopened, cancelling cooldown");
                }
                self.forget_commands();
                self.cooldown.cancel();
                self.evaluate().await;
            }
            _ => self.evaluate().await,
        }
    }

    fn automation_enabled(&self) -> bool {
        self.profile.enabled && self.global_auto.load(Ordering::SeqCst)
    }

    /// Let the next evaluation re-issue its commands even if unchanged
    fn forget_commands(&mut self) {
        self.last_command = None;
        self.last_light = None;
    }

    /// Start the cooldown; false when it is too short to arm
    fn arm_cooldown(&mut self) -> bool {
        let expire = self.tx.clone();
        let tick = self.tx.clone();
        let armed = self.cooldown.arm(
            Instant::now(),
            self.profile.cooldown,
            move |generation| {
                let _ = expire.send(ControllerEvent::CooldownExpired(generation));
            },
            move || {
                let _ = tick.send(ControllerEvent::CooldownTick);
            },
        );
        if armed {
            info!(
                profile = %self.profile.name,
                secs = self.profile.cooldown.as_secs(),
                "Cooldown started"
            );
        }
        armed
    }

    /// Track the cover's position; returns true when it should be re-evaluated
    fn cover_changed(&mut self, old: Option<&State>, new: Option<&State>) -> bool {
        let available = new.is_some_and(|s| !s.is_unavailable());
        let was_available = old.is_some_and(|s| !s.is_unavailable());

        let position = new.and_then(State::current_position);
        let previous = self
            .last_known_position
            .or_else(|| old.and_then(State::current_position));
        if position.is_some() {
            self.last_known_position = position;
        }

        if !available {
            return false;
        }
        if !was_available {
            info!(profile = %self.profile.name, "Actuator available");
            self.actuator_warning.reset();
            return true;
        }

        if let (Some(previous), Some(position)) = (previous, position) {
            let moved = (position - previous).abs();
            if moved > MANUAL_CHANGE_THRESHOLD && !self.guard.is_active(Instant::now()) {
                info!(
                    profile = %self.profile.name,
                    from = previous,
                    to = position,
                    "Manual cover movement detected"
                );
                self.set_status(Status::Active, Reason::ManualControlActive);
            }
        }
        false
    }

    async fn daily_reset(&mut self) {
        info!(profile = %self.profile.name, latch = %self.latch, "Daily reset");
        self.latch = self.latch.reset();
        self.forget_commands();
        self.set_status(Status::Active, Reason::DailyReset);
        self.evaluate().await;
    }

    #[instrument(skip(self), fields(profile = %self.profile.name))]
    async fn evaluate(&mut self) {
        let now = Instant::now();
        let sensors = self.ctx.sensors.clone();
        let decision = policy::evaluate(&PolicyInput {
            profile: &self.profile,
            global_auto: self.global_auto.load(Ordering::SeqCst),
            latch: self.latch,
            cooldown_active: self.cooldown.is_active(now),
            now: self.ctx.clock.now(),
            sun: self.ctx.sun.current_position(),
            sensors: &*sensors,
        });

        debug!(
            action = ?decision.action,
            light = ?decision.light,
            status = %decision.status,
            reason = %decision.reason,
            "Evaluated"
        );

        if decision.reason == Reason::ActuatorNotFound && self.actuator_warning.allow(now) {
            warn!(cover = %self.profile.cover, "Actuator not found or unavailable");
        }

        if decision.latch != self.latch {
            info!(from = %self.latch, to = %decision.latch, "Brightness latch changed");
            self.latch = decision.latch;
            self.forget_commands();
        }

        self.apply_cover(decision.action).await;
        self.apply_light(decision.light).await;
        self.set_status(decision.status, decision.reason);
    }

    async fn apply_cover(&mut self, action: CoverAction) {
        if action == CoverAction::None {
            return;
        }
        if self.last_command == Some(action) {
            debug!(profile = %self.profile.name, action = ?action, "Already commanded, skipping");
            return;
        }

        let cover = &self.profile.cover;
        let actuator = &*self.ctx.actuator;
        self.guard.arm(Instant::now());
        let result = match action {
            CoverAction::Open => open_with_fallback(actuator, cover).await,
            CoverAction::Close => {
                close_with_fallback(actuator, cover, self.profile.night_position).await
            }
            CoverAction::Stop => actuator.stop(cover).await,
            CoverAction::SetPosition(position) => actuator.set_position(cover, position).await,
            CoverAction::None => return,
        };

        match result {
            Ok(()) => {
                info!(profile = %self.profile.name, cover = %cover, action = ?action, "Cover commanded");
                self.last_command = Some(action);
            }
            Err(e) if e.is_unsupported() => {
                warn!(profile = %self.profile.name, error = %e, "No supported cover command");
            }
            Err(e) => {
                error!(profile = %self.profile.name, error = %e, "Cover command failed");
            }
        }
    }

    async fn apply_light(&mut self, action: LightAction) {
        let Some(light) = self.profile.light.as_ref() else {
            return;
        };
        if action == LightAction::Keep || self.last_light == Some(action) {
            return;
        }

        let lights = &*self.ctx.lights;
        let result = match action {
            LightAction::On(pct) => lights.turn_on(&light.entity, pct).await,
            LightAction::Off => lights.turn_off(&light.entity).await,
            LightAction::Keep => return,
        };

        match result {
            Ok(()) => {
                debug!(profile = %self.profile.name, light = %light.entity, action = ?action, "Light commanded");
                self.last_light = Some(action);
            }
            Err(e) => {
                warn!(profile = %self.profile.name, error = %e, "Light command failed");
            }
        }
    }

    /// Manual actions bypass duplicate suppression and leave the latch alone
    async fn manual(&mut self, command: ManualCommand) -> Result<(), CommandError> {
        let profile = self.profile.clone();
        let cover = &profile.cover;
        let sensors = self.ctx.sensors.clone();
        if !sensors.is_available(cover) {
            return Err(CommandError::Unavailable {
                entity_id: cover.to_string(),
            });
        }

        self.guard.arm(Instant::now());
        let actuator = &*self.ctx.actuator;
        let reason = match command {
            ManualCommand::Open => {
                open_with_fallback(actuator, cover).await?;
                Reason::ManualOpen
            }
            ManualCommand::Stop => {
                actuator.stop(cover).await?;
                Reason::ManualStop
            }
            ManualCommand::CloseRespectingRules => {
                let door = DoorState::read(&*sensors, profile.door_sensor.as_ref());
                let window_open = profile
                    .window_sensor
                    .as_ref()
                    .is_some_and(|w| sensors.read_bool(w));

                if door == DoorState::Open {
                    actuator
                        .set_position(cover, profile.door_safe_position())
                        .await?;
                } else if window_open || door == DoorState::Tilted {
                    actuator.set_position(cover, profile.vent_position).await?;
                } else {
                    close_with_fallback(actuator, cover, profile.night_position).await?;
                }
                Reason::ManualClose
            }
        };

        info!(profile = %profile.name, command = ?command, "Manual command executed");
        self.set_status(Status::Active, reason);
        Ok(())
    }

    fn set_status(&mut self, status: Status, reason: Reason) {
        self.status = status;
        self.reason = reason;
        self.publish();
    }

    fn publish(&self) {
        let remaining = self.cooldown.remaining(Instant::now());
        let cooldown_remaining = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        self.ctx.status.emit(ProfileSnapshot {
            profile: self.profile.name.clone(),
            status: self.status,
            reason: self.reason.clone(),
            cooldown_remaining,
            latch: self.latch,
            last_position: self.last_known_position,
            updated: Utc::now(),
        });
    }

    fn release(&mut self) {
        self.cooldown.cancel();
        for timer in self.timers.drain(..) {
            timer.cancel();
        }
        for listener in self.listeners.drain(..) {
            listener.remove();
        }
    }
}

/// Map a state change to the controller event it stands for
fn classify(cover: &EntityId, data: StateChangedData) -> Option<ControllerEvent> {
    if &data.entity_id == cover {
        return Some(ControllerEvent::CoverChanged {
            old: data.old_state,
            new: data.new_state,
        });
    }

    if data.entity_id.is_domain(sun::DOMAIN) {
        let old = data.old_state.as_ref().map(|s| s.state.as_str());
        let new = data.new_state.as_ref().map(|s| s.state.as_str());
        return match (old, new) {
            (Some(sun::STATE_BELOW_HORIZON), Some(sun::STATE_ABOVE_HORIZON)) => {
                Some(ControllerEvent::Sunrise)
            }
            (Some(sun::STATE_ABOVE_HORIZON), Some(sun::STATE_BELOW_HORIZON)) => {
                Some(ControllerEvent::Sunset)
            }
            _ => None,
        };
    }

    Some(ControllerEvent::SensorChanged {
        entity_id: data.entity_id,
        old: data.old_state,
        new: data.new_state,
    })
}
