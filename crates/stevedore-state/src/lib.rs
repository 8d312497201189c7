//! stevedore-state — coordination store for the scheduler.
//!
//! Backed by [redb](https://docs.rs/redb), this crate is the durable
//! source of truth for configuration versions, task status, the service
//! property namespace, and the scheduler leadership lock.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).
//! Every mutation is a single redb write transaction, so persists are
//! all-or-nothing from the caller's point of view.
//!
//! On top of the store sit two small primitives:
//!
//! - **`StateCache`** — a refreshable in-memory snapshot of the property
//!   namespace; can be disabled, in which case reads go direct and
//!   refresh fails fast with a conflict.
//! - **`LeaderLock`** — mutual exclusion for scheduler instances, keyed
//!   by service identity. Acquisition strictly precedes any config write.

pub mod cache;
pub mod error;
pub mod lock;
pub mod store;
pub mod tables;
pub mod types;

pub use cache::StateCache;
pub use error::{StateError, StateResult};
pub use lock::LeaderLock;
pub use store::StateStore;
pub use types::*;
