//! Shading decision engine
//!
//! This crate decides, for every configured cover, which position it should
//! take right now and issues the commands to get it there.
//!
//! # Architecture
//!
//! ```text
//! state changes ─┐
//! sun events ────┤
//! ticks/timers ──┼─► ProfileController ─► policy::evaluate ─► dispatch ─► services
//! manual actions ┘         │
//!                          └──────────────► StatusBus (snapshots)
//! ```
//!
//! - **Policy**: a pure, priority-ordered evaluator ([`policy::evaluate`])
//! - **Latch**: the brightness trigger state ([`Latch`])
//! - **Controller**: one task per profile owning latch, cooldown and guard
//! - **Supervisor**: starts, reloads and stops controllers
//!
//! # Key Types
//!
//! - [`Supervisor`] - Owns every profile controller
//! - [`ControllerHandle`] - Handle to one running controller
//! - [`EngineContext`] - Sensors, sun, dispatchers, clock and status bus
//! - [`Decision`] - Outcome of one policy evaluation
//! - [`StatusBus`] - Typed status updates with subscription handles

pub mod clock;
pub mod context;
pub mod controller;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod latch;
pub mod policy;
pub mod schedule;
pub mod sensors;
pub mod status;
pub mod supervisor;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use context::EngineContext;
pub use controller::{ControllerHandle, ManualCommand};
pub use dispatch::{
    clamp_position, ActuatorDispatcher, LightCoordinator, ServiceDispatcher,
    ServiceLightCoordinator,
};
pub use error::{CommandError, SupervisorError, SupervisorResult};
pub use latch::Latch;
pub use policy::{evaluate, CoverAction, Decision, LightAction, PolicyInput};
pub use sensors::{DoorState, SensorSnapshot, SunGeometry, SunPosition};
pub use status::{ProfileSnapshot, Reason, Status, StatusBus, StatusSubscription};
pub use supervisor::Supervisor;
