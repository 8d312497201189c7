//! Command implementations behind the `stevedore` verbs.
//!
//! Every command opens the coordination store and attaches to the
//! registered service without contending for leadership; only `run`
//! registers as the active scheduler. Query output is JSON on stdout.

pub mod debug;
pub mod plan;
pub mod pod;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use stevedore_core::config::ServiceConfig;
use stevedore_scheduler::SchedulerState;
use stevedore_state::StateStore;

/// Resolve the store path: the `--store` flag, then `$STEVEDORE_STORE`,
/// then `./stevedore.redb`.
pub fn store_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("STEVEDORE_STORE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("stevedore.redb"))
}

/// Attach to the registered service for queries and plan operations.
pub fn attach(store: &Path) -> Result<SchedulerState> {
    let config = ServiceConfig::from_env()?;
    let store = StateStore::open(store)
        .with_context(|| format!("failed to open store at {}", store.display()))?;
    Ok(SchedulerState::attach(config, store)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_flag_takes_precedence() {
        let path = store_path(Some(PathBuf::from("/tmp/custom.redb")));
        assert_eq!(path, PathBuf::from("/tmp/custom.redb"));
    }

    #[test]
    fn attach_requires_a_registered_service() {
        let dir = tempfile::tempdir().unwrap();
        let err = attach(&dir.path().join("empty.redb")).unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }
}
