//! Agent registration and lookup.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use recall_types::{Agent, TrustLevel};

use super::Store;
use crate::error::{Result, StorageError};

fn row_to_agent(row: &Row) -> rusqlite::Result<Agent> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    let disabled_at: Option<String> = row.get("disabled_at")?;
    let trust_level: i16 = row.get("trust_level")?;

    Ok(Agent {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        name: row.get("name")?,
        api_key_hash: row.get("api_key_hash")?,
        created_at: created_at.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
        disabled_at: disabled_at.and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        trust_level: TrustLevel::try_from(trust_level).unwrap_or(TrustLevel::UNVERIFIED),
    })
}

impl Store {
    /// Create a new agent with the given name and pre-hashed api key.
    /// `api_key_hash` is unique; a collision surfaces as [`StorageError::Conflict`].
    pub fn create_agent(&self, name: &str, api_key_hash: &str) -> Result<Agent> {
        let agent = Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            api_key_hash: api_key_hash.to_string(),
            created_at: Utc::now(),
            disabled_at: None,
            trust_level: TrustLevel::UNVERIFIED,
        };

        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO agents (id, name, api_key_hash, created_at, disabled_at, trust_level) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                agent.id.to_string(),
                agent.name,
                agent.api_key_hash,
                agent.created_at.to_rfc3339(),
                None::<String>,
                i16::from(agent.trust_level),
            ],
        );

        match result {
            Ok(_) => Ok(agent),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Conflict("api key hash already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an agent by the hash of its bearer token. Returns `None` if no
    /// agent matches; the caller (the authentication gate) treats both "no
    /// match" and "disabled" distinctly (401 vs 403).
    pub fn find_agent_by_key_hash(&self, api_key_hash: &str) -> Result<Option<Agent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, api_key_hash, created_at, disabled_at, trust_level \
             FROM agents WHERE api_key_hash = ?1",
        )?;
        let mut rows = stmt.query(params![api_key_hash])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_agent(row)?)),
            None => Ok(None),
        }
    }

    /// Look up an agent by id, used by admin quarantine to validate the
    /// target exists before touching anything.
    pub fn find_agent_by_id(&self, agent_id: Uuid) -> Result<Option<Agent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, api_key_hash, created_at, disabled_at, trust_level \
             FROM agents WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![agent_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_agent(row)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_find_agent_round_trips() {
        let store = Store::open_in_memory(4).unwrap();
        let created = store.create_agent("Alice", "hash-abc").unwrap();

        let found = store.find_agent_by_key_hash("hash-abc").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Alice");
        assert_eq!(found.trust_level, TrustLevel::UNVERIFIED);
        assert!(!found.is_disabled());
    }

    #[test]
    fn duplicate_api_key_hash_is_a_conflict() {
        let store = Store::open_in_memory(4).unwrap();
        store.create_agent("Alice", "hash-abc").unwrap();
        let err = store.create_agent("Eve", "hash-abc").unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn unknown_key_hash_returns_none() {
        let store = Store::open_in_memory(4).unwrap();
        assert!(store.find_agent_by_key_hash("nope").unwrap().is_none());
    }
}
