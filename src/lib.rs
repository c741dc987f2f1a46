//! # matchstream - live match feed client
//!
//! Consumes a sporting-event domain feed and rebuilds the match timeline:
//! - Push (Server-Sent Events) and pull (cursor polling) transports behind one trait
//! - Server clock correction from `Date`/`Age` headers on polled batches
//! - Period and possession tracking with a retractable possession stack
//! - Time normalization relative to the current period
//! - Fan-out of enriched events to local subscribers
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐   Delivery   ┌───────────────────────────┐
//!   feed (SSE) ─► │ PushTransport│ ───────────► │      EventTranslator      │
//!                 └──────────────┘              │  ┌─────────────────────┐  │  MatchEvent
//!                 ┌──────────────┐              │  │    TimelineState    │  │ ──────────► on(kind, cb)
//!   feed (GET) ─► │ PullTransport│ ───────────► │  │ period │ possession │  │
//!                 └──────────────┘              │  └─────────────────────┘  │
//!                        ▲                      └─────────────┬─────────────┘
//!                        └──────── stop() on final endPeriod ─┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod bus;
pub mod events;
pub mod timeline;
pub mod translator;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;

pub use events::{EventKind, MatchEvent};
pub use translator::EventTranslator;
pub use transport::{PullTransport, PushTransport, Transport};
pub use types::{Config, Error, Result};
