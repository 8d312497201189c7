//! `stevedore pod` — pod instance listings and task status.

use std::path::Path;

use anyhow::Result;

use super::{attach, print_json};

pub fn list(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&state.instance_names())
}

pub fn status(store: &Path, instance: Option<&str>, json: bool) -> Result<()> {
    let state = attach(store)?;
    if json {
        return match instance {
            Some(name) => print_json(&state.instance_status(name)?),
            None => print_json(&state.service_status()),
        };
    }
    let instances = match instance {
        Some(name) => vec![state.instance_status(name)?],
        None => state
            .instance_names()
            .iter()
            .map(|name| state.instance_status(name))
            .collect::<Result<_, _>>()?,
    };
    for view in instances {
        match view.tasks.first() {
            Some(task) => println!("{}: {}", view.name, task.status),
            None => println!("{}: no task", view.name),
        }
    }
    Ok(())
}

pub fn info(store: &Path, instance: &str) -> Result<()> {
    let state = attach(store)?;
    print_json(&state.instance_info(instance)?)
}
