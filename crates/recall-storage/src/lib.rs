//! Persistent storage for agents, memories, links and retrieval events,
//! including online near-duplicate detection, semantic search and admin
//! operations. SQLite plus the sqlite-vec extension, behind a single
//! mutex-guarded connection.

mod error;
mod schema;
mod shortid;
mod store;
mod vector;

pub mod validation;

pub use error::{Result, StorageError};
pub use store::{MemoryDetail, RelatedMemoryRow, SearchRow, SimilarEntry, Store, WriteOutcome};
