//! Core entities: Agent, Memory, MemoryLink, RetrievalEvent, SystemConfig.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-agent trust principal, `0` (unverified) .. `2` (core/admin).
///
/// Gates both the rate-limit rule table and the initial `quality` of a
/// written memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct TrustLevel(i16);

impl TrustLevel {
    pub const UNVERIFIED: TrustLevel = TrustLevel(0);
    pub const TRUSTED: TrustLevel = TrustLevel(1);
    pub const CORE: TrustLevel = TrustLevel(2);

    /// `true` for admin-only operations (heartbeat, quarantine).
    pub fn is_admin(self) -> bool {
        self.0 >= 2
    }

    pub fn as_i16(self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for TrustLevel {
    type Error = crate::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        if (0..=2).contains(&value) {
            Ok(TrustLevel(value))
        } else {
            Err(crate::Error::Validation(format!(
                "trust_level must be 0, 1, or 2, got {value}"
            )))
        }
    }
}

impl From<TrustLevel> for i16 {
    fn from(value: TrustLevel) -> Self {
        value.0
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public 12-character handle, `RCL-` + 8 uppercase alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortId(String);

impl ShortId {
    const PREFIX: &'static str = "RCL-";
    const SUFFIX_LEN: usize = 8;

    /// Wrap an already-generated handle, validating its shape.
    ///
    /// Generation itself lives in `recall-storage::shortid` (it needs a CSPRNG
    /// and is retried on collision by the storage layer).
    pub fn parse(raw: impl Into<String>) -> Result<Self, crate::Error> {
        let raw = raw.into();
        let ok = raw
            .strip_prefix(Self::PREFIX)
            .map(|suffix| {
                suffix.len() == Self::SUFFIX_LEN
                    && suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            })
            .unwrap_or(false);
        if ok {
            Ok(ShortId(raw))
        } else {
            Err(crate::Error::Validation(format!(
                "invalid short id '{raw}', expected RCL-XXXXXXXX"
            )))
        }
    }

    /// Build from a validated suffix without re-checking the alphabet; used by
    /// the generator which already drew from `[A-Z0-9]`.
    pub fn from_generated(suffix: &str) -> Self {
        debug_assert_eq!(suffix.len(), Self::SUFFIX_LEN);
        ShortId(format!("{}{}", Self::PREFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated principal that may read and write memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    /// One-way digest of the bearer secret; never the secret itself.
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub trust_level: TrustLevel,
}

impl Agent {
    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }
}

/// A single shareable note, anchored to its author and indexed by embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub short_id: ShortId,
    pub agent_id: Uuid,
    pub content: String,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub embedding_model: String,
    /// `-2` quarantined, `-1` low-trust-author provisional, `0` neutral, `1+` endorsed.
    pub quality: i32,
    pub duplicate_of: Option<Uuid>,
}

impl Memory {
    pub const QUARANTINED: i32 = -2;
    pub const PROVISIONAL: i32 = -1;
    pub const NEUTRAL: i32 = 0;

    pub fn is_quarantined(&self) -> bool {
        self.quality <= Self::QUARANTINED
    }
}

/// Relation of a `MemoryLink`, determined solely by similarity and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Similar,
    DuplicateCandidate,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Similar => write!(f, "similar"),
            RelationKind::DuplicateCandidate => write!(f, "duplicate_candidate"),
        }
    }
}

impl std::str::FromStr for RelationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "similar" => Ok(RelationKind::Similar),
            "duplicate_candidate" => Ok(RelationKind::DuplicateCandidate),
            other => Err(crate::Error::Internal(format!(
                "unknown memory link relation '{other}'"
            ))),
        }
    }
}

/// A directed edge from a newly-written memory to a pre-existing one it resembles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLink {
    pub id: Uuid,
    pub memory_id: Uuid,
    pub related_id: Uuid,
    pub relation: RelationKind,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

/// Observability + future ranking signal: one row per (reader, returned memory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalEvent {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub memory_id: Uuid,
    pub query: String,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

/// Well-known `SystemConfig` keys.
pub mod config_keys {
    pub const GLOBAL_WRITE_ENABLED: &str = "global_write_enabled";
    pub const LAST_ADMIN_HEARTBEAT: &str = "last_admin_heartbeat";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_level_rejects_out_of_range() {
        assert!(TrustLevel::try_from(3).is_err());
        assert!(TrustLevel::try_from(-1).is_err());
        assert!(TrustLevel::try_from(0).is_ok());
    }

    #[test]
    fn trust_level_admin_requires_core() {
        assert!(!TrustLevel::TRUSTED.is_admin());
        assert!(TrustLevel::CORE.is_admin());
    }

    #[test]
    fn short_id_parse_accepts_well_formed() {
        let id = ShortId::parse("RCL-AB12CD34").unwrap();
        assert_eq!(id.as_str(), "RCL-AB12CD34");
    }

    #[test]
    fn short_id_parse_rejects_bad_shapes() {
        assert!(ShortId::parse("RCL-AB12").is_err());
        assert!(ShortId::parse("XYZ-AB12CD34").is_err());
        assert!(ShortId::parse("RCL-ab12cd34").is_err());
    }

    #[test]
    fn relation_kind_round_trips_through_str() {
        use std::str::FromStr;
        assert_eq!(
            RelationKind::from_str("duplicate_candidate").unwrap(),
            RelationKind::DuplicateCandidate
        );
        assert_eq!(RelationKind::Similar.to_string(), "similar");
    }
}
