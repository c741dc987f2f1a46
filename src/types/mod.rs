//! Core types for the feed client.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Opaque feed identifiers (EventId, ObservationId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for feed, session, and logging

mod config;
mod errors;
mod ids;

pub use config::{Config, FeedConfig, FeedMode, ObservabilityConfig, SessionConfig};
pub use errors::{Error, Result};
pub use ids::{EventId, ObservationId};
