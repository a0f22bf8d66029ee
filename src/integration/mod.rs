//! Integration layer wiring the widget, relay and avatar session together

pub mod config;
pub mod orchestrator;

pub use config::BridgeConfig;
pub use orchestrator::{Bridge, BridgeCommand, BridgeEvent, BridgeHandle};
