//! Admin operations: liveness heartbeat and per-agent quarantine.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use recall_types::{config_keys, Memory};

use super::Store;
use crate::error::{Result, StorageError};

impl Store {
    /// Set `last_admin_heartbeat = now` and re-enable global writes.
    /// Idempotent: repeated calls leave `global_write_enabled = true` and
    /// advance the heartbeat timestamp monotonically.
    pub fn admin_heartbeat(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.set_config(config_keys::LAST_ADMIN_HEARTBEAT, &now.to_rfc3339())?;
        self.set_config(config_keys::GLOBAL_WRITE_ENABLED, "true")?;
        Ok(now)
    }

    /// Disable an agent and quarantine every memory it authored, atomically.
    /// A missing agent is reported as [`StorageError::NotFound`] so the API
    /// layer can answer 404.
    pub fn quarantine_agent(&self, agent_id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)",
            params![agent_id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::NotFound(format!("agent {agent_id} not found")));
        }

        tx.execute(
            "UPDATE agents SET disabled_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), agent_id.to_string()],
        )?;
        tx.execute(
            "UPDATE memories SET quality = ?1 WHERE agent_id = ?2",
            params![Memory::QUARANTINED, agent_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }
}
