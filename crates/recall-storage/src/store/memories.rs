//! Write pipeline with online near-duplicate detection, semantic search,
//! and memory lookup.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use recall_types::{Memory, MemoryLink, RelationKind, ShortId};

use super::Store;
use crate::error::{Result, StorageError};

const MAX_SHORT_ID_ATTEMPTS: usize = 5;
const PROBE_LIMIT: usize = 10;
const PROBE_OVERFETCH: i64 = 50;

fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    let id: String = row.get("id")?;
    let short_id: String = row.get("short_id")?;
    let agent_id: String = row.get("agent_id")?;
    let created_at: String = row.get("created_at")?;
    let duplicate_of: Option<String> = row.get("duplicate_of")?;

    Ok(Memory {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        short_id: ShortId::from_generated(
            short_id.strip_prefix("RCL-").unwrap_or(&short_id),
        ),
        agent_id: Uuid::parse_str(&agent_id).unwrap_or_default(),
        content: row.get("content")?,
        tags: Vec::new(),
        source_url: row.get("source_url")?,
        created_at: created_at.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
        embedding_model: row.get("embedding_model")?,
        quality: row.get("quality")?,
        duplicate_of: duplicate_of.and_then(|s| Uuid::parse_str(&s).ok()),
    })
}

fn load_tags(conn: &Connection, memory_id: Uuid) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT tag FROM memory_tags WHERE memory_id = ?1 ORDER BY rowid")?;
    let tags = stmt
        .query_map(params![memory_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

/// A similarity hit surfaced in a write response or a search result.
#[derive(Debug, Clone)]
pub struct SimilarEntry {
    pub id: Uuid,
    pub short_id: ShortId,
    pub similarity: f64,
    pub relation: RelationKind,
}

/// Result of [`Store::insert_memory_and_probe`]: the new memory plus the
/// links created against pre-existing memories, in probe order.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub memory: Memory,
    pub similar: Vec<SimilarEntry>,
}

/// A row from the semantic search pipeline: a memory joined with its
/// author's name, similarity to the query, and popularity signal.
#[derive(Debug, Clone)]
pub struct SearchRow {
    pub memory: Memory,
    pub author_name: String,
    pub similarity: f64,
    pub retrieval_count: i64,
}

/// A related memory surfaced in [`Store::get_memory_by_id_or_short`].
#[derive(Debug, Clone)]
pub struct RelatedMemoryRow {
    pub id: Uuid,
    pub short_id: ShortId,
    pub relation: RelationKind,
    pub similarity: f64,
}

/// Full detail view of a single memory.
#[derive(Debug, Clone)]
pub struct MemoryDetail {
    pub memory: Memory,
    pub author_name: String,
    pub related: Vec<RelatedMemoryRow>,
}

/// Raw `(memory_id, distance)` pair from a probe against the vector index,
/// restricted to rows with `quality > -2` and excluding a given id.
///
/// `vec0` has no join support, so the quality filter runs as a second
/// query against the `memories` table rather than inside the `MATCH`.
fn probe_candidates(
    conn: &Connection,
    embedding: &[f32],
    exclude: Option<Uuid>,
    limit: usize,
) -> Result<Vec<(Uuid, f64)>> {
    let candidates = crate::vector::search_similar(conn, embedding, PROBE_OVERFETCH as usize, exclude)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = candidates.iter().map(|hit| hit.memory_id.to_string()).collect();
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT id, quality FROM memories WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let mut quality_rows = stmt.query(param_refs.as_slice())?;

    let mut qualities = std::collections::HashMap::new();
    while let Some(row) = quality_rows.next()? {
        let id_str: String = row.get(0)?;
        let quality: i32 = row.get(1)?;
        if let Ok(id) = Uuid::parse_str(&id_str) {
            qualities.insert(id, quality);
        }
    }

    let mut filtered: Vec<(Uuid, f64)> = candidates
        .into_iter()
        .filter(|hit| qualities.get(&hit.memory_id).is_some_and(|q| *q > Memory::QUARANTINED))
        .map(|hit| (hit.memory_id, hit.distance))
        .collect();

    filtered.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    filtered.truncate(limit);
    Ok(filtered)
}

impl Store {
    /// The write pipeline with online near-duplicate detection, run
    /// atomically: insert, probe, link, at-most-once duplicate promotion.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_memory_and_probe(
        &self,
        agent_id: Uuid,
        content: &str,
        tags: &[String],
        source_url: Option<&str>,
        embedding: &[f32],
        embedding_model: &str,
        quality: i32,
        min_similarity: f64,
        duplicate_threshold: f64,
        auto_duplicate_threshold: f64,
    ) -> Result<WriteOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let memory_id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut short_id = crate::shortid::generate();
        let mut attempts = 0;
        loop {
            let result = tx.execute(
                "INSERT INTO memories \
                 (id, short_id, agent_id, content, source_url, created_at, embedding_model, quality, duplicate_of) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                params![
                    memory_id.to_string(),
                    short_id,
                    agent_id.to_string(),
                    content,
                    source_url,
                    created_at.to_rfc3339(),
                    embedding_model,
                    quality,
                ],
            );
            match result {
                Ok(_) => break,
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation
                        && attempts < MAX_SHORT_ID_ATTEMPTS =>
                {
                    attempts += 1;
                    short_id = crate::shortid::generate();
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        for tag in tags {
            tx.execute(
                "INSERT INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                params![memory_id.to_string(), tag],
            )?;
        }

        crate::vector::store_embedding(&tx, memory_id, embedding)?;

        let candidates = probe_candidates(&tx, embedding, Some(memory_id), PROBE_LIMIT)?;

        let mut similar = Vec::new();
        let mut duplicate_of: Option<Uuid> = None;

        for (related_id, distance) in candidates {
            let similarity = 1.0 - distance;
            if similarity < min_similarity {
                continue;
            }

            let relation = if similarity >= duplicate_threshold {
                RelationKind::DuplicateCandidate
            } else {
                RelationKind::Similar
            };

            let link_id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO memory_links (id, memory_id, related_id, relation, similarity, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    link_id.to_string(),
                    memory_id.to_string(),
                    related_id.to_string(),
                    relation.to_string(),
                    similarity,
                    created_at.to_rfc3339(),
                ],
            )?;

            let related_short_id: String = tx.query_row(
                "SELECT short_id FROM memories WHERE id = ?1",
                params![related_id.to_string()],
                |row| row.get(0),
            )?;

            similar.push(SimilarEntry {
                id: related_id,
                short_id: ShortId::from_generated(
                    related_short_id.strip_prefix("RCL-").unwrap_or(&related_short_id),
                ),
                similarity: round4(similarity),
                relation,
            });

            if duplicate_of.is_none() && similarity >= auto_duplicate_threshold {
                duplicate_of = Some(related_id);
            }
        }

        if let Some(dup_of) = duplicate_of {
            tx.execute(
                "UPDATE memories SET duplicate_of = ?1 WHERE id = ?2",
                params![dup_of.to_string(), memory_id.to_string()],
            )?;
        }

        tx.commit()?;

        let memory = Memory {
            id: memory_id,
            short_id: ShortId::from_generated(short_id.trim_start_matches("RCL-")),
            agent_id,
            content: content.to_string(),
            tags: tags.to_vec(),
            source_url: source_url.map(|s| s.to_string()),
            created_at,
            embedding_model: embedding_model.to_string(),
            quality,
            duplicate_of,
        };

        Ok(WriteOutcome { memory, similar })
    }

    /// Semantic search: top-`limit` memories by cosine similarity, filtered
    /// to `quality > -2` and `similarity >= min_similarity`.
    pub fn vector_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SearchRow>> {
        let conn = self.conn.lock().unwrap();
        let candidates = probe_candidates(&conn, query_embedding, None, limit.max(PROBE_LIMIT))?;

        let mut rows = Vec::new();
        for (memory_id, distance) in candidates {
            let similarity = 1.0 - distance;
            if similarity < min_similarity {
                continue;
            }
            if rows.len() >= limit {
                break;
            }

            let mut stmt = conn.prepare(
                "SELECT m.id, m.short_id, m.agent_id, m.content, m.source_url, m.created_at, \
                        m.embedding_model, m.quality, m.duplicate_of, a.name \
                 FROM memories m JOIN agents a ON a.id = m.agent_id \
                 WHERE m.id = ?1",
            )?;
            let mut result = stmt.query(params![memory_id.to_string()])?;
            let Some(row) = result.next()? else { continue };

            let mut memory = row_to_memory(row)?;
            let author_name: String = row.get(9)?;
            memory.tags = load_tags(&conn, memory_id)?;

            let retrieval_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM retrieval_events WHERE memory_id = ?1",
                params![memory_id.to_string()],
                |r| r.get(0),
            )?;

            rows.push(SearchRow {
                memory,
                author_name,
                similarity: round4(similarity),
                retrieval_count,
            });
        }

        Ok(rows)
    }

    /// Look up a memory by its 128-bit id or its `RCL-` short id, including
    /// every outgoing link. Quarantined links remain visible here by
    /// design — filtering, if desired, is a caller concern.
    pub fn get_memory_by_id_or_short(&self, handle: &str) -> Result<Option<MemoryDetail>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT m.id, m.short_id, m.agent_id, m.content, m.source_url, m.created_at, \
                    m.embedding_model, m.quality, m.duplicate_of, a.name \
             FROM memories m JOIN agents a ON a.id = m.agent_id \
             WHERE m.id = ?1 OR m.short_id = ?1",
        )?;
        let mut rows = stmt.query(params![handle])?;
        let Some(row) = rows.next()? else { return Ok(None) };

        let mut memory = row_to_memory(row)?;
        let author_name: String = row.get(9)?;
        memory.tags = load_tags(&conn, memory.id)?;

        let mut link_stmt = conn.prepare(
            "SELECT related_id, relation, similarity FROM memory_links \
             WHERE memory_id = ?1 ORDER BY created_at",
        )?;
        let related = link_stmt
            .query_map(params![memory.id.to_string()], |row| {
                let related_id: String = row.get(0)?;
                let relation: String = row.get(1)?;
                let similarity: f64 = row.get(2)?;
                Ok((related_id, relation, similarity))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut related_rows = Vec::with_capacity(related.len());
        for (related_id_str, relation_str, similarity) in related {
            let related_id = Uuid::parse_str(&related_id_str)
                .map_err(|e| StorageError::InvalidHandle(e.to_string()))?;
            let short_id: String = conn.query_row(
                "SELECT short_id FROM memories WHERE id = ?1",
                params![related_id_str],
                |r| r.get(0),
            )?;
            let relation = relation_str
                .parse::<RelationKind>()
                .map_err(|e| StorageError::Invariant(e.to_string()))?;
            related_rows.push(RelatedMemoryRow {
                id: related_id,
                short_id: ShortId::from_generated(short_id.trim_start_matches("RCL-")),
                relation,
                similarity: round4(similarity),
            });
        }

        Ok(Some(MemoryDetail {
            memory,
            author_name,
            related: related_rows,
        }))
    }

    /// Append-only retrieval-event log. Best-effort: callers swallow
    /// failures here so a logging hiccup never poisons a successful read.
    pub fn log_retrieval(
        &self,
        agent_id: Uuid,
        memory_id: Uuid,
        query: &str,
        similarity: f64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO retrieval_events (id, agent_id, memory_id, query, similarity, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                agent_id.to_string(),
                memory_id.to_string(),
                query,
                similarity,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

/// Round a similarity score to four decimals for reporting; full precision
/// is what gets stored.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vec(dims: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dims];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn write_with_no_prior_memories_has_no_similar_entries() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        let outcome = store
            .insert_memory_and_probe(
                agent.id,
                "first memory content that is long enough to pass validation",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        assert!(outcome.similar.is_empty());
        assert!(outcome.memory.short_id.as_str().starts_with("RCL-"));
        assert!(outcome.memory.duplicate_of.is_none());
    }

    #[test]
    fn near_identical_write_is_flagged_as_duplicate() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        let first = store
            .insert_memory_and_probe(
                agent.id,
                "memory A content that is long enough to pass validation checks",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        let second = store
            .insert_memory_and_probe(
                agent.id,
                "memory B content that is long enough to pass validation checks",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        assert_eq!(second.memory.duplicate_of, Some(first.memory.id));
        assert_eq!(second.similar.len(), 1);
        assert_eq!(second.similar[0].id, first.memory.id);
        assert_eq!(second.similar[0].relation, RelationKind::DuplicateCandidate);
        assert!(second.similar[0].similarity >= 0.97);
    }

    #[test]
    fn dissimilar_write_produces_no_links() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        store
            .insert_memory_and_probe(
                agent.id,
                "memory about gardening and composting techniques for beginners",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        let second = store
            .insert_memory_and_probe(
                agent.id,
                "memory about distributed systems consensus algorithms in depth",
                &["c".to_string(), "d".to_string()],
                None,
                &unit_vec(4, 2),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        assert!(second.similar.is_empty());
        assert!(second.memory.duplicate_of.is_none());
    }

    #[test]
    fn quarantined_memories_are_excluded_from_the_probe() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        let first = store
            .insert_memory_and_probe(
                agent.id,
                "memory A content that is long enough to pass validation checks",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        store.quarantine_agent(agent.id).unwrap();
        let _ = first;

        let second_agent = store.create_agent("Bob", "hash-2").unwrap();
        let second = store
            .insert_memory_and_probe(
                second_agent.id,
                "memory B content that is long enough to pass validation checks",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        assert!(second.similar.is_empty());
    }

    #[test]
    fn vector_search_finds_the_closest_match_and_excludes_quarantined() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        store
            .insert_memory_and_probe(
                agent.id,
                "memory about rust ownership and the borrow checker in depth",
                &["rust".to_string(), "lang".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        let results = store.vector_search(&unit_vec(4, 0), 10, 0.55).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].author_name, "Alice");
        assert!(results[0].similarity > 0.99);

        store.quarantine_agent(agent.id).unwrap();
        let results_after = store.vector_search(&unit_vec(4, 0), 10, 0.55).unwrap();
        assert!(results_after.is_empty());
    }

    #[test]
    fn get_memory_by_id_or_short_finds_either_handle() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();

        let outcome = store
            .insert_memory_and_probe(
                agent.id,
                "memory content that is long enough to satisfy the minimum length",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        let by_short = store
            .get_memory_by_id_or_short(outcome.memory.short_id.as_str())
            .unwrap()
            .expect("found by short id");
        assert_eq!(by_short.memory.id, outcome.memory.id);
        assert_eq!(by_short.author_name, "Alice");

        let by_id = store
            .get_memory_by_id_or_short(&outcome.memory.id.to_string())
            .unwrap()
            .expect("found by uuid");
        assert_eq!(by_id.memory.id, outcome.memory.id);
    }

    #[test]
    fn unknown_handle_returns_none() {
        let store = Store::open_in_memory(4).unwrap();
        assert!(store
            .get_memory_by_id_or_short("RCL-ZZZZZZZZ")
            .unwrap()
            .is_none());
    }

    #[test]
    fn log_retrieval_is_append_only() {
        let store = Store::open_in_memory(4).unwrap();
        let agent = store.create_agent("Alice", "hash-1").unwrap();
        let outcome = store
            .insert_memory_and_probe(
                agent.id,
                "memory content that is long enough to satisfy the minimum length",
                &["a".to_string(), "b".to_string()],
                None,
                &unit_vec(4, 0),
                "test-stub",
                0,
                0.55,
                0.92,
                0.97,
            )
            .unwrap();

        store
            .log_retrieval(agent.id, outcome.memory.id, "q", 0.9)
            .unwrap();
        store
            .log_retrieval(agent.id, outcome.memory.id, "q", 0.9)
            .unwrap();

        let results = store.vector_search(&unit_vec(4, 0), 10, 0.55).unwrap();
        assert_eq!(results[0].retrieval_count, 2);
    }
}
