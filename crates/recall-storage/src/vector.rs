//! Vector storage and similarity search via the sqlite-vec extension.
//!
//! sqlite-vec's `vec0` virtual table is this deployment's approximate-nearest-
//! neighbour index: a `memory_embeddings` table keyed by memory id, queried
//! with `MATCH` and ordered by `distance` (cosine distance, ascending).

use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;
use zerocopy::IntoBytes;

use crate::error::Result;

/// Register the sqlite-vec extension with the process's SQLite driver.
///
/// Must be called once before opening any connection that needs vector
/// operations (`sqlite3_auto_extension` applies process-wide).
pub fn init_vector_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        #[allow(clippy::missing_transmute_annotations)]
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    }
}

/// Return the sqlite-vec extension version, confirming it loaded.
pub fn check_vector_extension(conn: &Connection) -> Result<String> {
    let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
    Ok(version)
}

/// Create the `memory_embeddings` vec0 virtual table for the deployment's
/// configured embedding dimension.
pub fn create_vector_table(conn: &Connection, dims: usize) -> Result<()> {
    let sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memory_embeddings USING vec0(\
            memory_id TEXT PRIMARY KEY, \
            embedding float[{dims}] distance_metric=cosine\
        )"
    );
    conn.execute_batch(&sql)?;
    info!(dims, "created memory_embeddings vector table");
    Ok(())
}

/// Store (or replace) the embedding for a memory. `vec0` has no
/// `INSERT OR REPLACE`, so an existing row is deleted first.
pub fn store_embedding(conn: &Connection, memory_id: Uuid, embedding: &[f32]) -> Result<()> {
    conn.execute(
        "DELETE FROM memory_embeddings WHERE memory_id = ?1",
        rusqlite::params![memory_id.to_string()],
    )?;
    conn.execute(
        "INSERT INTO memory_embeddings (memory_id, embedding) VALUES (?1, ?2)",
        rusqlite::params![memory_id.to_string(), embedding.as_bytes()],
    )?;
    debug!(%memory_id, "stored embedding");
    Ok(())
}

/// A single similarity-probe hit: a memory id and its cosine distance from
/// the query vector (`similarity = 1 - distance`).
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    pub memory_id: Uuid,
    pub distance: f64,
}

/// Top-`limit` nearest neighbours of `query_embedding`, ordered by ascending
/// distance, excluding `exclude`. Ties broken by `memory_id` ascending so
/// repeated probes against an unchanged corpus are deterministic.
pub fn search_similar(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
    exclude: Option<Uuid>,
) -> Result<Vec<SimilarityHit>> {
    // vec0 does not support ORDER BY on a secondary column after `distance`,
    // so the tie-break is applied by fetching a small surplus and resorting
    // in memory when ties are detected.
    let fetch_limit = limit + 1;
    let mut stmt = conn.prepare(
        "SELECT memory_id, distance FROM memory_embeddings \
         WHERE embedding MATCH ?1 AND k = ?2 \
         ORDER BY distance",
    )?;

    let mut rows = stmt.query(rusqlite::params![
        query_embedding.as_bytes(),
        fetch_limit as i64
    ])?;

    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let id_str: String = row.get(0)?;
        let distance: f64 = row.get(1)?;
        let memory_id = Uuid::parse_str(&id_str)
            .map_err(|e| crate::error::StorageError::InvalidHandle(e.to_string()))?;
        if Some(memory_id) == exclude {
            continue;
        }
        results.push(SimilarityHit { memory_id, distance });
        if results.len() >= limit {
            break;
        }
    }

    results.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });

    Ok(results)
}

/// Number of stored embeddings.
pub fn count_embeddings(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_embeddings", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn(dims: usize) -> Connection {
        init_vector_extension();
        let conn = Connection::open_in_memory().unwrap();
        create_vector_table(&conn, dims).unwrap();
        conn
    }

    #[test]
    fn extension_loads_and_reports_a_version() {
        let conn = test_conn(4);
        let version = check_vector_extension(&conn).unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn stores_and_counts_embeddings() {
        let conn = test_conn(4);
        let id = Uuid::new_v4();
        store_embedding(&conn, id, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(count_embeddings(&conn).unwrap(), 1);
    }

    #[test]
    fn search_orders_by_ascending_distance_and_excludes_self() {
        let conn = test_conn(4);
        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();
        let id3 = Uuid::new_v4();

        store_embedding(&conn, id1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store_embedding(&conn, id2, &[0.9, 0.1, 0.0, 0.0]).unwrap();
        store_embedding(&conn, id3, &[0.0, 0.0, 1.0, 0.0]).unwrap();

        let results = search_similar(&conn, &[1.0, 0.0, 0.0, 0.0], 10, Some(id1)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].memory_id, id2);
        assert_eq!(results[1].memory_id, id3);
        assert!(results[0].distance < results[1].distance);
    }
}
