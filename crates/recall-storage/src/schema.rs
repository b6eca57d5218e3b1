//! Persisted schema: the five entity tables plus the `memory_tags`
//! join table sqlite-vec's vec0 table needs as a sidecar.
//!
//! SQLite has no native array or GIN column type, so `tags` is normalized
//! into `memory_tags(memory_id, tag)` with a B-tree index on `tag` — the
//! relational equivalent of a GIN-indexed array column.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

const SCHEMA_VERSION: i32 = 1;

pub fn create_schema(conn: &Connection, embedding_dims: usize) -> Result<()> {
    let current_version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        debug!(current_version, "schema up to date");
        return Ok(());
    }

    info!(from = current_version, to = SCHEMA_VERSION, "migrating schema");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            api_key_hash    TEXT NOT NULL UNIQUE,
            created_at      TEXT NOT NULL,
            disabled_at     TEXT,
            trust_level     INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_agents_created_at ON agents(created_at);

        CREATE TABLE IF NOT EXISTS memories (
            id              TEXT PRIMARY KEY,
            short_id        TEXT NOT NULL UNIQUE,
            agent_id        TEXT NOT NULL REFERENCES agents(id),
            content         TEXT NOT NULL,
            source_url      TEXT,
            created_at      TEXT NOT NULL,
            embedding_model TEXT NOT NULL,
            quality         INTEGER NOT NULL DEFAULT 0,
            duplicate_of    TEXT REFERENCES memories(id)
        );
        CREATE INDEX IF NOT EXISTS idx_memories_agent_id ON memories(agent_id);
        CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);
        CREATE INDEX IF NOT EXISTS idx_memories_short_id ON memories(short_id);

        CREATE TABLE IF NOT EXISTS memory_tags (
            memory_id       TEXT NOT NULL REFERENCES memories(id),
            tag             TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_tags_tag ON memory_tags(tag);
        CREATE INDEX IF NOT EXISTS idx_memory_tags_memory_id ON memory_tags(memory_id);

        CREATE TABLE IF NOT EXISTS memory_links (
            id              TEXT PRIMARY KEY,
            memory_id       TEXT NOT NULL REFERENCES memories(id),
            related_id      TEXT NOT NULL REFERENCES memories(id),
            relation        TEXT NOT NULL,
            similarity      REAL NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_links_memory_id ON memory_links(memory_id);
        CREATE INDEX IF NOT EXISTS idx_memory_links_related_id ON memory_links(related_id);

        CREATE TABLE IF NOT EXISTS retrieval_events (
            id              TEXT PRIMARY KEY,
            agent_id        TEXT NOT NULL REFERENCES agents(id),
            memory_id       TEXT NOT NULL REFERENCES memories(id),
            query           TEXT NOT NULL,
            similarity      REAL NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_retrieval_events_memory_id ON retrieval_events(memory_id);
        CREATE INDEX IF NOT EXISTS idx_retrieval_events_created_at ON retrieval_events(created_at);

        CREATE TABLE IF NOT EXISTS system_config (
            key             TEXT PRIMARY KEY,
            value           TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| crate::error::StorageError::Migration(e.to_string()))?;

    crate::vector::create_vector_table(conn, embedding_dims)?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| crate::error::StorageError::Migration(e.to_string()))?;

    Ok(())
}
