//! Domain types shared across the scheduler: pod specifications, task
//! lifecycle states, and the naming conventions that tie instances, tasks,
//! and persisted properties together.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tolerance for comparing cpu allocations, which travel through
/// JSON doubles and may lose exactness on the way.
pub const CPU_EPSILON: f64 = 1e-3;

/// Compare two cpu values with tolerance.
pub fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() < CPU_EPSILON
}

/// Per-instance resource allocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Resources {
    /// CPU shares per instance.
    pub cpus: f64,
    /// Memory per instance, in MiB.
    pub mem_mb: u32,
}

impl Resources {
    /// Resource equality with cpu tolerance.
    pub fn matches(&self, other: &Resources) -> bool {
        close_enough(self.cpus, other.cpus) && self.mem_mb == other.mem_mb
    }
}

/// A declared pod type: `count` identical instances of `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodSpec {
    pub name: String,
    pub count: u32,
    pub resources: Resources,
}

impl PodSpec {
    /// Instance names for this pod type, densely indexed from 0.
    pub fn instance_names(&self) -> Vec<String> {
        (0..self.count).map(|i| instance_name(&self.name, i)).collect()
    }
}

/// Lifecycle state of a task, using the runtime's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "TASK_STAGING")]
    Staging,
    #[serde(rename = "TASK_STARTING")]
    Starting,
    #[serde(rename = "TASK_RUNNING")]
    Running,
    #[serde(rename = "TASK_FAILED")]
    Failed,
    #[serde(rename = "TASK_KILLED")]
    Killed,
}

impl TaskState {
    /// Wire name, e.g. `TASK_RUNNING`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
        }
    }

    /// Short name without the `TASK_` prefix, used in status listings.
    pub fn short_name(&self) -> &'static str {
        // as_str always starts with "TASK_".
        &self.as_str()[5..]
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Naming conventions ─────────────────────────────────────────────

/// Instance name for a pod type and index, e.g. `world-1`.
pub fn instance_name(pod: &str, index: u32) -> String {
    format!("{pod}-{index}")
}

/// Task name for an instance, e.g. `world-1-server`.
pub fn task_name(instance: &str) -> String {
    format!("{instance}-server")
}

/// Task id: `{sanitized_service}__{task_name}__{uuid}`.
pub fn task_id(service: &str, instance: &str, uuid: &Uuid) -> String {
    format!("{}__{}__{uuid}", sanitize_service_name(service), task_name(instance))
}

/// Service names may be folder paths (`/test/integration/hello-world`);
/// task ids use the dotted form without the leading slash.
pub fn sanitize_service_name(service: &str) -> String {
    service.trim_start_matches('/').replace('/', ".")
}

/// Split an instance name into pod type and index, if well-formed.
pub fn split_instance_name(instance: &str) -> Option<(&str, u32)> {
    let (pod, index) = instance.rsplit_once('-')?;
    let index = index.parse().ok()?;
    Some((pod, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_names_densely_indexed() {
        let pod = PodSpec {
            name: "world".to_string(),
            count: 3,
            resources: Resources { cpus: 0.1, mem_mb: 256 },
        };
        assert_eq!(pod.instance_names(), vec!["world-0", "world-1", "world-2"]);
    }

    #[test]
    fn task_naming() {
        assert_eq!(task_name("hello-0"), "hello-0-server");

        let uuid = Uuid::new_v4();
        let id = task_id("/test/integration/hello-world", "hello-0", &uuid);
        assert_eq!(id, format!("test.integration.hello-world__hello-0-server__{uuid}"));
    }

    #[test]
    fn sanitize_folders() {
        assert_eq!(sanitize_service_name("hello-world"), "hello-world");
        assert_eq!(
            sanitize_service_name("/test/integration/hello-world"),
            "test.integration.hello-world"
        );
    }

    #[test]
    fn split_instance() {
        assert_eq!(split_instance_name("world-12"), Some(("world", 12)));
        assert_eq!(split_instance_name("hello-0"), Some(("hello", 0)));
        assert_eq!(split_instance_name("nodash"), None);
        assert_eq!(split_instance_name("world-x"), None);
    }

    #[test]
    fn task_state_names() {
        assert_eq!(TaskState::Running.as_str(), "TASK_RUNNING");
        assert_eq!(TaskState::Running.short_name(), "RUNNING");
        assert_eq!(TaskState::Failed.short_name(), "FAILED");
        assert_eq!(
            serde_json::to_string(&TaskState::Killed).unwrap(),
            "\"TASK_KILLED\""
        );
    }

    #[test]
    fn cpu_tolerance() {
        assert!(close_enough(0.1, 0.1000001));
        assert!(!close_enough(0.1, 0.2));

        let a = Resources { cpus: 0.1, mem_mb: 256 };
        let b = Resources { cpus: 0.1000001, mem_mb: 256 };
        let c = Resources { cpus: 0.1, mem_mb: 512 };
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
