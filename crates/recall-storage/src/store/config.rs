//! System-wide key/value configuration: `global_write_enabled` and
//! `last_admin_heartbeat`.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::error::Result;

impl Store {
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO system_config (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM system_config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Absence of the `global_write_enabled` key means writes are enabled —
    /// a freshly-deployed instance should not start in lockdown.
    pub fn is_write_enabled(&self) -> Result<bool> {
        let value = self.get_config(recall_types::config_keys::GLOBAL_WRITE_ENABLED)?;
        Ok(value.map(|v| v == "true").unwrap_or(true))
    }
}
