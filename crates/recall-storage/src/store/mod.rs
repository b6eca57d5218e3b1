//! SQLite-backed implementation of the storage layer.
//!
//! A single connection wrapped in a [`Mutex`] is the only writer of
//! persistent state: every multi-statement sequence that touches more
//! than one entity runs inside one [`rusqlite::Transaction`].

mod admin;
mod agents;
mod config;
mod memories;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::error::Result;

pub use memories::{MemoryDetail, RelatedMemoryRow, SearchRow, SimilarEntry, WriteOutcome};

/// Persistent store for agents, memories, links, retrieval events and
/// system configuration.
pub struct Store {
    conn: Mutex<Connection>,
    embedding_dims: usize,
}

// All access to the inner Connection goes through `Mutex<Connection>`.
unsafe impl Send for Store {}
unsafe impl Sync for Store {}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("embedding_dims", &self.embedding_dims)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at the given path. `:memory:` opens a
    /// transient in-process database, used by tests.
    pub fn open(path: impl AsRef<Path>, embedding_dims: usize) -> Result<Self> {
        crate::vector::init_vector_extension();

        let path = path.as_ref();
        if path.to_string_lossy() != ":memory:" {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|_| {
                        crate::error::StorageError::Migration(format!(
                            "failed to create parent directory for {}",
                            path.display()
                        ))
                    })?;
                }
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            embedding_dims,
        };
        store.initialize()?;

        info!(path = %path.display(), "storage layer opened");
        Ok(store)
    }

    /// Convenience constructor for an in-memory store (tests).
    pub fn open_in_memory(embedding_dims: usize) -> Result<Self> {
        Self::open(":memory:", embedding_dims)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        crate::schema::create_schema(&conn, self.embedding_dims)?;
        Ok(())
    }

    pub fn embedding_dims(&self) -> usize {
        self.embedding_dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_creates_schema() {
        let store = Store::open_in_memory(4).unwrap();
        let conn = store.conn.lock().unwrap();
        let version =
            crate::vector::check_vector_extension(&conn).expect("vec extension should load");
        assert!(!version.is_empty());
    }
}
