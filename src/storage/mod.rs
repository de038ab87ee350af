//! Persistence for samples, rules, alerts, syslog and topology
//!
//! ## Design
//!
//! - **Trait-based**: one narrow async trait per collaborator, bundled by
//!   `StorageBackend`
//! - **Async**: all operations are async for use from Tokio actors
//! - **Insert-only samples**: metric rows are never updated
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database with migrations
//! - **In-Memory**: no persistence, for testing or `backend: none`
//!
//! ## Usage
//!
//! ```no_run
//! use netpulse::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./netpulse.db").await?;
//!     backend.health_check().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{
    AlertSink, DeviceInventory, HealthStatus, InventoryAdmin, LogStore, MetricStore, QueryRange,
    RuleRepository, StorageBackend, TopologyStore,
};
pub use error::{StorageError, StorageResult};
