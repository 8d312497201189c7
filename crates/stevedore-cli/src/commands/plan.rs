//! `stevedore plan` — plan inspection and lifecycle operations.
//!
//! Mutations (interrupt, continue, force-restart) are applied to the
//! persisted plan and acknowledged once durable; the active scheduler
//! picks them up on its next run.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use stevedore_plan::Plan;

use super::{attach, print_json};

pub fn list(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&state.plan_names())
}

pub fn show(store: &Path, name: &str, json: bool) -> Result<()> {
    let state = attach(store)?;
    let plan = state.plan(name)?;
    if json {
        return print_json(&plan_view(plan));
    }
    println!("{} ({})", plan.name, plan.status());
    for phase in &plan.phases {
        println!("├─ {} ({})", phase.name, phase.status());
        for step in &phase.steps {
            println!("│  ├─ {} ({})", step.name, step.status);
        }
    }
    Ok(())
}

pub fn force_restart(store: &Path, name: &str) -> Result<()> {
    let mut state = attach(store)?;
    state.force_restart_plan(name)?;
    println!("Received cmd: restart");
    Ok(())
}

pub fn interrupt(store: &Path, name: &str, phase: &str) -> Result<()> {
    let mut state = attach(store)?;
    state.interrupt_plan(name, phase)?;
    println!("Received cmd: interrupt");
    Ok(())
}

pub fn proceed(store: &Path, name: &str, phase: &str) -> Result<()> {
    let mut state = attach(store)?;
    state.continue_plan(name, phase)?;
    println!("Received cmd: continue");
    Ok(())
}

/// Render a plan with its derived phase and plan statuses.
fn plan_view(plan: &Plan) -> serde_json::Value {
    json!({
        "name": plan.name,
        "status": plan.status().to_string(),
        "phases": plan.phases.iter().map(|phase| json!({
            "name": phase.name,
            "status": phase.status().to_string(),
            "steps": phase.steps.iter().map(|step| json!({
                "name": step.name,
                "status": step.status.to_string(),
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}
