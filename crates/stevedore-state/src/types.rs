//! Persisted domain types for the coordination store.
//!
//! Configuration versions and task records are JSON-serialized into redb
//! tables; property values are opaque bytes owned by the scheduler.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stevedore_core::types::{PodSpec, Resources, TaskState, task_id, task_name};

/// A versioned configuration record. Every accepted configuration change
/// persists a new record; the `ConfigTarget` meta key names the current one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigRecord {
    pub id: Uuid,
    /// Pod topology in declaration order.
    pub pods: Vec<PodSpec>,
}

impl ConfigRecord {
    /// Create a new configuration version for the given topology.
    pub fn new(pods: Vec<PodSpec>) -> Self {
        Self { id: Uuid::new_v4(), pods }
    }

    /// Look up a pod spec by type name.
    pub fn pod(&self, name: &str) -> Option<&PodSpec> {
        self.pods.iter().find(|p| p.name == name)
    }

    /// All instance names, pod types in declaration order, indices ascending.
    pub fn instance_names(&self) -> Vec<String> {
        self.pods.iter().flat_map(|p| p.instance_names()).collect()
    }

    /// Whether two records describe the same topology (ignoring version id).
    pub fn same_topology(&self, other: &ConfigRecord) -> bool {
        self.pods.len() == other.pods.len()
            && self.pods.iter().zip(&other.pods).all(|(a, b)| {
                a.name == b.name && a.count == b.count && a.resources.matches(&b.resources)
            })
    }
}

/// The live task backing a pod instance.
///
/// A task's uuid (and therefore its id) changes only when the task is
/// relaunched; config changes that do not require a relaunch leave it
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    /// `{service}__{instance}-server__{uuid}`.
    pub id: String,
    /// `{instance}-server`.
    pub name: String,
    /// Owning pod instance, e.g. `world-1`.
    pub instance: String,
    /// Owning pod type, e.g. `world`.
    pub pod: String,
    pub state: TaskState,
    pub resources: Resources,
}

impl TaskRecord {
    /// Create a freshly launched task for an instance, minting a new uuid.
    pub fn launch(service: &str, pod: &str, instance: &str, resources: Resources) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            id: task_id(service, instance, &uuid),
            name: task_name(instance),
            instance: instance.to_string(),
            pod: pod.to_string(),
            state: TaskState::Staging,
            resources,
        }
    }

    /// Storage key in the tasks table.
    pub fn table_key(&self) -> &str {
        &self.instance
    }

    /// Property key under which this task's status is recorded.
    pub fn status_property_key(&self) -> String {
        format!("{}:task-status", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Resources {
        Resources { cpus: 0.1, mem_mb: 256 }
    }

    #[test]
    fn config_record_instance_names() {
        let record = ConfigRecord::new(vec![
            PodSpec { name: "hello".to_string(), count: 1, resources: resources() },
            PodSpec { name: "world".to_string(), count: 2, resources: resources() },
        ]);
        assert_eq!(record.instance_names(), vec!["hello-0", "world-0", "world-1"]);
    }

    #[test]
    fn same_topology_ignores_version_id() {
        let pods = vec![PodSpec { name: "hello".to_string(), count: 1, resources: resources() }];
        let a = ConfigRecord::new(pods.clone());
        let b = ConfigRecord::new(pods);
        assert_ne!(a.id, b.id);
        assert!(a.same_topology(&b));

        let mut c = b.clone();
        c.pods[0].count = 2;
        assert!(!a.same_topology(&c));
    }

    #[test]
    fn launched_task_identity() {
        let task = TaskRecord::launch("hello-world", "world", "world-1", resources());
        assert_eq!(task.name, "world-1-server");
        assert!(task.id.starts_with("hello-world__world-1-server__"));
        assert_eq!(task.state, TaskState::Staging);
        assert_eq!(task.table_key(), "world-1");
        assert_eq!(task.status_property_key(), "world-1-server:task-status");
    }

    #[test]
    fn relaunch_mints_a_new_uuid() {
        let a = TaskRecord::launch("svc", "world", "world-0", resources());
        let b = TaskRecord::launch("svc", "world", "world-0", resources());
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, b.name);
    }
}
