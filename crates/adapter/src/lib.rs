//! Persistence adapters for the warden data model.
//!
//! [`MemoryAdapter`] keeps everything in process memory and is meant for
//! tests and single-process deployments. [`SqliteAdapter`] (feature
//! `sqlite`, on by default) stores records through sqlx.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAdapter;
pub use {memory::MemoryAdapter, warden_common::Adapter};

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
