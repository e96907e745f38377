//! Common test utilities for the shading engine
//!
//! Provides a test hub (state store, event bus and a service registry that
//! records every cover and light call), a wall clock that follows Tokio's
//! paused time, and fixture loading.

#![allow(dead_code)]

mod fixtures;
mod test_hub;

pub use fixtures::*;
pub use test_hub::*;
