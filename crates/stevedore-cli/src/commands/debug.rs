//! `stevedore debug` — raw access to the coordination store.

use std::path::Path;

use anyhow::{Context, Result};
use uuid::Uuid;

use super::{attach, print_json};

pub fn framework_id(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&vec![state.framework_id()?.to_string()])
}

pub fn properties(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&state.properties()?)
}

pub fn property(store: &Path, key: &str) -> Result<()> {
    let state = attach(store)?;
    let value = state.property(key)?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

pub fn refresh_cache(store: &Path) -> Result<()> {
    let state = attach(store)?;
    state.refresh_cache()?;
    println!("Received cmd: refresh");
    Ok(())
}

pub fn config_list(store: &Path) -> Result<()> {
    let state = attach(store)?;
    let ids: Vec<String> = state.config_ids()?.iter().map(Uuid::to_string).collect();
    print_json(&ids)
}

pub fn config_show(store: &Path, id: &str) -> Result<()> {
    let state = attach(store)?;
    let id: Uuid = id.parse().context("invalid configuration id")?;
    print_json(&state.config_version(id)?)
}

pub fn config_target(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&state.target()?)
}

pub fn config_target_id(store: &Path) -> Result<()> {
    let state = attach(store)?;
    print_json(&vec![state.target_id()?.to_string()])
}
