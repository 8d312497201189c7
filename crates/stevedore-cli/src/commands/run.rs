//! `stevedore run` — register as the active scheduler and execute
//! every plan to its resting state.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use stevedore_core::config::ServiceConfig;
use stevedore_scheduler::SchedulerState;
use stevedore_state::StateStore;

pub fn run(store: &Path) -> Result<()> {
    let config = ServiceConfig::from_env()?;
    let store = StateStore::open(store)
        .with_context(|| format!("failed to open store at {}", store.display()))?;

    let mut state = SchedulerState::register(config, store)?;
    info!(
        service = %state.service_config().service_name,
        "scheduler registered"
    );
    state.run_to_completion()?;

    for name in state.plan_names() {
        let plan = state.plan(&name)?;
        println!("{name}: {}", plan.status());
    }
    for instance in state.instance_names() {
        let status = state.instance_status(&instance)?;
        let task = status.tasks.first().map(|t| t.status.as_str()).unwrap_or("NONE");
        println!("{instance}: {task}");
    }
    Ok(())
}
