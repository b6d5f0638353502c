// Core business logic module

pub mod config;
pub mod sensors;

// Re-export commonly used items
pub use config::{ConfigError, DeviceInfo, ProviderConfig, TargetConfig};
pub use sensors::{SensorRuntime, TargetSnapshot};
