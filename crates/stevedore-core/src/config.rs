//! Service configuration, read from environment-style fields.
//!
//! The scheduler is configured by its deployment platform through flat
//! environment variables: per-pod instance counts and resource sizes,
//! the service name, and the state-cache toggle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PodSpec, Resources};

/// Errors raised while reading the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
}

/// Declared settings for one pod type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodSettings {
    pub name: String,
    pub count: u32,
    pub cpus: f64,
    pub mem_mb: u32,
}

impl PodSettings {
    /// Convert to the persisted pod specification.
    pub fn to_spec(&self) -> PodSpec {
        PodSpec {
            name: self.name.clone(),
            count: self.count,
            resources: Resources { cpus: self.cpus, mem_mb: self.mem_mb },
        }
    }
}

/// Full service configuration: pod topology plus scheduler toggles.
///
/// Pod types keep their declaration order; the registry and plan engine
/// both iterate them in this order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub service_name: String,
    pub pods: Vec<PodSettings>,
    /// `DISABLE_STATE_CACHE` unset ⇒ true.
    pub state_cache_enabled: bool,
}

impl ServiceConfig {
    /// Default hello-world topology: one `hello` pod, two `world` pods.
    pub fn hello_world(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            pods: vec![
                PodSettings { name: "hello".to_string(), count: 1, cpus: 0.1, mem_mb: 256 },
                PodSettings { name: "world".to_string(), count: 2, cpus: 0.2, mem_mb: 512 },
            ],
            state_cache_enabled: true,
        }
    }

    /// Read the configuration from process environment variables.
    ///
    /// Recognized fields: `SERVICE_NAME`, `{POD}_COUNT`, `{POD}_CPUS`,
    /// `{POD}_MEM`, `DISABLE_STATE_CACHE` (presence disables the cache).
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Read the configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let service_name = vars
            .get("SERVICE_NAME")
            .cloned()
            .unwrap_or_else(|| "hello-world".to_string());

        let mut config = Self::hello_world(&service_name);
        config.state_cache_enabled = !vars.contains_key("DISABLE_STATE_CACHE");

        for pod in &mut config.pods {
            let prefix = pod.name.to_uppercase();
            if let Some(value) = vars.get(&format!("{prefix}_COUNT")) {
                pod.count = parse_var(&format!("{prefix}_COUNT"), value)?;
            }
            if let Some(value) = vars.get(&format!("{prefix}_CPUS")) {
                pod.cpus = parse_var(&format!("{prefix}_CPUS"), value)?;
            }
            if let Some(value) = vars.get(&format!("{prefix}_MEM")) {
                pod.mem_mb = parse_var(&format!("{prefix}_MEM"), value)?;
            }
        }

        Ok(config)
    }

    /// Look up a pod type by name.
    pub fn pod(&self, name: &str) -> Option<&PodSettings> {
        self.pods.iter().find(|p| p.name == name)
    }

    /// Set the declared instance count for a pod type.
    pub fn set_count(&mut self, pod: &str, count: u32) -> Result<(), ConfigError> {
        self.pod_mut(pod)?.count = count;
        Ok(())
    }

    /// Set the per-instance cpu allocation for a pod type.
    pub fn set_cpus(&mut self, pod: &str, cpus: f64) -> Result<(), ConfigError> {
        self.pod_mut(pod)?.cpus = cpus;
        Ok(())
    }

    /// The pod topology as persisted specs, in declaration order.
    pub fn pod_specs(&self) -> Vec<PodSpec> {
        self.pods.iter().map(PodSettings::to_spec).collect()
    }

    /// Total declared instance count across all pod types.
    pub fn total_instance_count(&self) -> u32 {
        self.pods.iter().map(|p| p.count).sum()
    }

    fn pod_mut(&mut self, name: &str) -> Result<&mut PodSettings, ConfigError> {
        self.pods.iter_mut().find(|p| p.name == name).ok_or_else(|| ConfigError::Invalid {
            var: "pod".to_string(),
            value: name.to_string(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var: var.to_string(),
        value: value.to_string(),
    })
}
