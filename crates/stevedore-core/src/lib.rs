//! stevedore-core — shared types, service configuration, and naming conventions.

pub mod config;
pub mod types;

pub use config::{ConfigError, PodSettings, ServiceConfig};
pub use types::*;
