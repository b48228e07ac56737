pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod telemetry;

pub use bridge::ListChangedFlag;
pub use config::{AppConfig, Command};
pub use telemetry::JsonlTelemetrySink;
