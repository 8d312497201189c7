//! PodRegistry — the live pod topology and its backing tasks.
//!
//! Holds the target topology (pod types in declaration order, instances
//! densely indexed) together with the task records currently backing
//! each instance, and renders the status/info views the command surface
//! serves.

use std::collections::BTreeMap;

use serde::Serialize;

use stevedore_core::types::PodSpec;
use stevedore_state::{StateResult, StateStore, TaskRecord};

use crate::error::{SchedulerError, SchedulerResult};

/// A task in the instance status listing. Exactly these three fields;
/// `status` is the short state name (`RUNNING`, not `TASK_RUNNING`).
#[derive(Debug, Serialize)]
pub struct TaskStatusView {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct InstanceStatusView {
    pub name: String,
    pub tasks: Vec<TaskStatusView>,
}

#[derive(Debug, Serialize)]
pub struct PodStatusView {
    pub name: String,
    pub instances: Vec<InstanceStatusView>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusView {
    pub service: String,
    pub pods: Vec<PodStatusView>,
}

/// Wrapper matching the runtime's task-id wire shape.
#[derive(Debug, Serialize)]
pub struct TaskIdView {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct TaskInfoBody {
    pub name: String,
    #[serde(rename = "taskId")]
    pub task_id: TaskIdView,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusBody {
    #[serde(rename = "taskId")]
    pub task_id: TaskIdView,
    pub state: String,
}

/// One entry in the pod info listing: the launch-time info alongside the
/// most recent status.
#[derive(Debug, Serialize)]
pub struct TaskInfoView {
    pub info: TaskInfoBody,
    pub status: TaskStatusBody,
}

/// The in-memory registry of pods and tasks for one service.
pub struct PodRegistry {
    service: String,
    pods: Vec<PodSpec>,
    tasks: BTreeMap<String, TaskRecord>,
}

impl PodRegistry {
    pub fn new(service: &str, pods: Vec<PodSpec>) -> Self {
        Self { service: service.to_string(), pods, tasks: BTreeMap::new() }
    }

    /// Load the registry from the store: target topology plus all
    /// persisted task records.
    pub fn load(service: &str, pods: Vec<PodSpec>, store: &StateStore) -> StateResult<Self> {
        let mut registry = Self::new(service, pods);
        for task in store.list_tasks()? {
            registry.tasks.insert(task.instance.clone(), task);
        }
        Ok(registry)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn pods(&self) -> &[PodSpec] {
        &self.pods
    }

    /// Replace the target topology. Task records are untouched.
    pub fn set_target(&mut self, pods: Vec<PodSpec>) {
        self.pods = pods;
    }

    /// All instance names: pod types in declaration order, indices
    /// ascending.
    pub fn instance_names(&self) -> Vec<String> {
        self.pods.iter().flat_map(|p| p.instance_names()).collect()
    }

    /// Whether the instance is part of the target topology.
    pub fn contains_instance(&self, instance: &str) -> bool {
        self.pods
            .iter()
            .any(|p| p.instance_names().iter().any(|n| n == instance))
    }

    pub fn task(&self, instance: &str) -> Option<&TaskRecord> {
        self.tasks.get(instance)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }

    /// Tasks currently in the given state.
    pub fn tasks_in_state(&self, state: stevedore_core::types::TaskState) -> Vec<TaskRecord> {
        self.tasks.values().filter(|t| t.state == state).cloned().collect()
    }

    pub fn insert_task(&mut self, task: TaskRecord) {
        self.tasks.insert(task.instance.clone(), task);
    }

    pub fn remove_task(&mut self, instance: &str) -> Option<TaskRecord> {
        self.tasks.remove(instance)
    }

    pub fn task_mut(&mut self, instance: &str) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(instance)
    }

    // ── Views ──────────────────────────────────────────────────────

    /// The full service status tree.
    pub fn service_status(&self) -> ServiceStatusView {
        ServiceStatusView {
            service: self.service.clone(),
            pods: self
                .pods
                .iter()
                .map(|pod| PodStatusView {
                    name: pod.name.clone(),
                    instances: pod
                        .instance_names()
                        .iter()
                        .map(|name| self.instance_view(name))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Status of a single pod instance.
    pub fn instance_status(&self, instance: &str) -> SchedulerResult<InstanceStatusView> {
        if !self.contains_instance(instance) {
            return Err(SchedulerError::InstanceNotFound(instance.to_string()));
        }
        Ok(self.instance_view(instance))
    }

    /// Task info entries for a single pod instance.
    pub fn instance_info(&self, instance: &str) -> SchedulerResult<Vec<TaskInfoView>> {
        if !self.contains_instance(instance) {
            return Err(SchedulerError::InstanceNotFound(instance.to_string()));
        }
        Ok(self
            .tasks
            .get(instance)
            .map(|task| {
                vec![TaskInfoView {
                    info: TaskInfoBody {
                        name: task.name.clone(),
                        task_id: TaskIdView { value: task.id.clone() },
                    },
                    status: TaskStatusBody {
                        task_id: TaskIdView { value: task.id.clone() },
                        state: task.state.as_str().to_string(),
                    },
                }]
            })
            .unwrap_or_default())
    }

    fn instance_view(&self, instance: &str) -> InstanceStatusView {
        InstanceStatusView {
            name: instance.to_string(),
            tasks: self
                .tasks
                .get(instance)
                .map(|task| {
                    vec![TaskStatusView {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        status: task.state.short_name().to_string(),
                    }]
                })
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_core::types::{Resources, TaskState};

    fn pods() -> Vec<PodSpec> {
        vec![
            PodSpec {
                name: "hello".to_string(),
                count: 1,
                resources: Resources { cpus: 0.1, mem_mb: 256 },
            },
            PodSpec {
                name: "world".to_string(),
                count: 2,
                resources: Resources { cpus: 0.2, mem_mb: 512 },
            },
        ]
    }

    fn registry_with_tasks() -> PodRegistry {
        let mut registry = PodRegistry::new("hello-world", pods());
        for (pod, instance) in [("hello", "hello-0"), ("world", "world-0"), ("world", "world-1")] {
            let mut task = TaskRecord::launch(
                "hello-world",
                pod,
                instance,
                Resources { cpus: 0.1, mem_mb: 256 },
            );
            task.state = TaskState::Running;
            registry.insert_task(task);
        }
        registry
    }

    #[test]
    fn instance_names_in_declaration_order() {
        let registry = PodRegistry::new("svc", pods());
        assert_eq!(registry.instance_names(), vec!["hello-0", "world-0", "world-1"]);
        assert!(registry.contains_instance("world-1"));
        assert!(!registry.contains_instance("world-2"));
    }

    #[test]
    fn service_status_shape() {
        let registry = registry_with_tasks();
        let status = registry.service_status();
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["service"], "hello-world");
        assert_eq!(json["pods"][1]["name"], "world");
        let task = &json["pods"][1]["instances"][0]["tasks"][0];
        assert_eq!(task["status"], "RUNNING");
        assert_eq!(task["name"], "world-0-server");
        // Exactly id, name, status.
        assert_eq!(task.as_object().unwrap().len(), 3);
    }

    #[test]
    fn instance_status_unknown_instance() {
        let registry = registry_with_tasks();
        let err = registry.instance_status("world-9").unwrap_err();
        assert!(matches!(err, SchedulerError::InstanceNotFound(_)));
    }

    #[test]
    fn instance_without_task_has_empty_listing() {
        let registry = PodRegistry::new("svc", pods());
        let status = registry.instance_status("hello-0").unwrap();
        assert!(status.tasks.is_empty());
        assert!(registry.instance_info("hello-0").unwrap().is_empty());
    }

    #[test]
    fn instance_info_wire_shape() {
        let registry = registry_with_tasks();
        let info = registry.instance_info("hello-0").unwrap();
        let json = serde_json::to_value(&info).unwrap();

        let entry = &json[0];
        assert_eq!(entry["info"]["name"], "hello-0-server");
        assert_eq!(entry["status"]["state"], "TASK_RUNNING");
        // info and status agree on the task id, nested under "value".
        assert_eq!(entry["info"]["taskId"]["value"], entry["status"]["taskId"]["value"]);
    }
}
