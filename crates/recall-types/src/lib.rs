//! Shared domain types for Recall, a multi-agent shared-memory service.
//!
//! Agents write short natural-language notes ([`Memory`]) that are indexed by
//! a dense embedding vector and retrievable by any other agent through
//! semantic search. This crate carries no I/O: it defines the core entities,
//! the trust/quality vocabulary, and the HTTP request/response DTOs shared
//! between the storage and server crates.

pub mod api;
pub mod entities;
pub mod error;

pub use entities::{
    Agent, Memory, MemoryLink, RelationKind, RetrievalEvent, ShortId, TrustLevel,
};
pub use error::{Error, Result};
