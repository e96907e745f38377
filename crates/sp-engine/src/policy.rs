//! Priority-ordered policy evaluation
//!
//! [`evaluate`] turns one profile's configuration, its latch, the cooldown
//! flag, a sensor snapshot, the wall-clock time and the sun position into a
//! [`Decision`]. It performs no I/O; the controller applies the result.
//!
//! Rules are checked in a fixed order and the first one that matches wins:
//!
//! 1. automation disabled (globally or for the profile)
//! 2. actuator missing or unavailable
//! 3. door fully open (always, moves to the door-safe position)
//! 4. door tilted while ventilation is armed
//! 5. window open while ventilation is armed
//! 6. cooldown running
//! 7. exact-minute up/down schedule
//! 8. brightness latch (areas in brightness mode)
//! 9. sun shading, night and default open

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use sp_config::ProfileConfig;
use sp_core::EntityId;

use crate::latch::Latch;
use crate::sensors::{DoorState, SensorSnapshot, SunPosition};
use crate::status::{Reason, Status};

/// Sun elevation above which shading may apply, in degrees
pub const SHADE_MIN_ELEVATION: f64 = 10.0;

/// What to do with the cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAction {
    None,
    Open,
    Close,
    Stop,
    SetPosition(u8),
}

/// What to do with the profile's light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    Keep,
    /// Turn on at the given brightness percentage
    On(u8),
    Off,
}

/// Everything one evaluation looks at
pub struct PolicyInput<'a> {
    pub profile: &'a ProfileConfig,
    pub global_auto: bool,
    pub latch: Latch,
    pub cooldown_active: bool,
    pub now: NaiveDateTime,
    pub sun: SunPosition,
    pub sensors: &'a dyn SensorSnapshot,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: CoverAction,
    pub light: LightAction,
    pub status: Status,
    pub reason: Reason,
    /// Latch to keep after this evaluation
    pub latch: Latch,
}

impl Decision {
    fn hold(status: Status, reason: Reason, latch: Latch) -> Self {
        Self {
            action: CoverAction::None,
            light: LightAction::Keep,
            status,
            reason,
            latch,
        }
    }

    fn act(action: CoverAction, reason: Reason, latch: Latch) -> Self {
        Self {
            action,
            light: LightAction::Keep,
            status: Status::Active,
            reason,
            latch,
        }
    }

    fn with_light(mut self, light: LightAction) -> Self {
        self.light = light;
        self
    }
}

/// Evaluate the rules for one profile
pub fn evaluate(input: &PolicyInput<'_>) -> Decision {
    let profile = input.profile;
    let sensors = input.sensors;
    let latch = input.latch;

    if !input.global_auto || !profile.enabled {
        return Decision::hold(Status::Inactive, Reason::AutoDisabled, latch);
    }

    if !sensors.is_available(&profile.cover) {
        return Decision::hold(Status::Inactive, Reason::ActuatorNotFound, latch);
    }

    let door = DoorState::read(sensors, profile.door_sensor.as_ref());
    if door == DoorState::Open {
        return Decision::act(
            CoverAction::SetPosition(profile.door_safe_position()),
            Reason::DoorOpen,
            latch,
        );
    }

    let vent = CoverAction::SetPosition(profile.vent_position);
    if door == DoorState::Tilted && latch.ventilation_armed() {
        return Decision::act(vent, Reason::DoorTilted, latch);
    }

    let window_open = profile
        .window_sensor
        .as_ref()
        .is_some_and(|w| sensors.read_bool(w));
    if window_open && latch.ventilation_armed() {
        return Decision::act(vent, Reason::WindowOpen, latch);
    }

    if input.cooldown_active {
        return Decision::hold(Status::Cooldown, Reason::CooldownActive, latch);
    }

    let weekday = input.now.weekday();
    if profile
        .down_time_on(weekday)
        .is_some_and(|t| same_minute(input.now, t))
    {
        return Decision::act(
            CoverAction::SetPosition(profile.night_position),
            Reason::TimeScheduleDown,
            latch,
        );
    }
    if profile
        .up_time_on(weekday)
        .is_some_and(|t| same_minute(input.now, t))
    {
        return Decision::act(CoverAction::Open, Reason::TimeScheduleUp, latch);
    }

    if let Some(decision) = brightness(input, window_open || door.is_opening()) {
        return decision;
    }

    solar(input)
}

/// Brightness latch; None when the profile's area is not in brightness mode
fn brightness(input: &PolicyInput<'_>, opening: bool) -> Option<Decision> {
    let profile = input.profile;
    let area = profile.area.as_ref().filter(|a| a.is_brightness_mode())?;
    let sensor = area.brightness_sensor.as_ref()?;

    let reading = input.sensors.read_float(sensor, 0.0);
    let lux = reading as i64;
    let latch = input.latch;

    if reading < area.brightness_down_lux && !latch.triggered_down() {
        let (action, reason) = if opening {
            (
                CoverAction::SetPosition(profile.vent_position),
                Reason::BrightnessLowWithOpening,
            )
        } else {
            (
                CoverAction::SetPosition(profile.night_position),
                Reason::BrightnessLow(lux),
            )
        };
        let light = light_on(profile, |l| l.on_night);
        return Some(Decision::act(action, reason, latch.latch_down()).with_light(light));
    }

    if reading > area.brightness_up_lux && !latch.triggered_up() {
        return Some(
            Decision::act(CoverAction::Open, Reason::BrightnessHigh(lux), latch.latch_up())
                .with_light(light_off(profile)),
        );
    }

    Some(Decision::hold(
        Status::Active,
        Reason::BrightnessHold(lux),
        latch,
    ))
}

fn solar(input: &PolicyInput<'_>) -> Decision {
    let profile = input.profile;
    let latch = input.latch;
    let sun = input.sun;

    if sun.elevation < 0.0 {
        return Decision::act(
            CoverAction::SetPosition(profile.night_position),
            Reason::NightMode,
            latch,
        )
        .with_light(light_on(profile, |l| l.on_night));
    }

    if sun.elevation > SHADE_MIN_ELEVATION && profile.in_azimuth(sun.azimuth) {
        let lux = reading(input.sensors, profile.lux_sensor.as_ref());
        let temp = reading(input.sensors, profile.temp_sensor.as_ref());

        let reason = match (lux, temp) {
            (Some(lux), _) if lux >= profile.lux_threshold => Some(Reason::SunShadeLux(lux as i64)),
            (_, Some(temp)) if temp >= profile.temp_threshold => Some(Reason::SunShadeTemp(temp)),
            _ => None,
        };
        if let Some(reason) = reason {
            return Decision::act(
                CoverAction::SetPosition(profile.day_position),
                reason,
                latch,
            )
            .with_light(light_on(profile, |l| l.on_shade));
        }
    }

    Decision::act(CoverAction::Open, Reason::DefaultOpen, latch).with_light(light_off(profile))
}

/// Numeric reading of an optional sensor; unconfigured sensors do not vote
fn reading(sensors: &dyn SensorSnapshot, sensor: Option<&EntityId>) -> Option<f64> {
    sensor.map(|id| sensors.read_float(id, 0.0))
}

fn light_on(profile: &ProfileConfig, follows: impl Fn(&sp_config::LightConfig) -> bool) -> LightAction {
    match &profile.light {
        Some(light) if follows(light) => LightAction::On(light.brightness_pct),
        _ => LightAction::Keep,
    }
}

fn light_off(profile: &ProfileConfig) -> LightAction {
    if profile.light.is_some() {
        LightAction::Off
    } else {
        LightAction::Keep
    }
}

fn same_minute(now: NaiveDateTime, at: NaiveTime) -> bool {
    now.hour() == at.hour() && now.minute() == at.minute()
}
