//! API routes.

pub mod admin;
pub mod agents;
pub mod health;
pub mod memory;
pub mod openapi;

pub use admin::{heartbeat_handler, quarantine_handler};
pub use agents::register_handler;
pub use health::health_handler;
pub use memory::{get_handler, search_handler, write_handler};
