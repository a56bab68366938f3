//! Solarman PV telemetry to MQTT bridge.

pub mod api;
pub mod auth;
pub mod config;
pub mod daemon;
pub mod daylight;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod transform;

pub use error::{Error, Result};
