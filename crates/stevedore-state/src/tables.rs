//! redb table definitions for the coordination store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types, or raw bytes for the property namespace).

use redb::TableDefinition;

/// Configuration versions keyed by `{config_uuid}`. History is retained.
pub const CONFIGS: TableDefinition<&str, &[u8]> = TableDefinition::new("configs");

/// Flat per-service property namespace keyed by `{property_key}`, e.g.
/// `world-1-server:task-status` or `last-completed-update-type`.
pub const PROPERTIES: TableDefinition<&str, &[u8]> = TableDefinition::new("properties");

/// Task records keyed by `{instance_name}`.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// Persisted plan trees keyed by `{plan_name}`.
pub const PLANS: TableDefinition<&str, &[u8]> = TableDefinition::new("plans");

/// Scheduler metadata: the `ConfigTarget` pointer, the framework id, and
/// leadership lock nodes keyed by `leader-lock:{service}`.
pub const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Meta key for the current target configuration id.
pub const META_CONFIG_TARGET: &str = "ConfigTarget";

/// Meta key for the registered framework id.
pub const META_FRAMEWORK_ID: &str = "framework-id";

/// Meta key prefix for leadership lock nodes.
pub fn lock_key(service: &str) -> String {
    format!("leader-lock:{service}")
}
