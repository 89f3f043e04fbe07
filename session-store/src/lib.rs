//! Pot Session Store
//!
//! Event sessions around the settlement engine: players join, submit their
//! final amounts, and the organizer settles once everyone is in.
//!
//! # Architecture
//!
//! - **Stores**: [`SessionStore`] with an in-memory and a JSON-file backend
//! - **Service**: [`SessionService`] checks preconditions, serializes writes
//!   per session and keeps the stored transaction set in step with the players
//! - **Expiry**: sessions are dropped 24 hours after creation by a periodic
//!   sweep driven by an injectable [`Clock`]
//! - **Export**: completed sessions are appended to a results table
//!
//! # Invariants
//!
//! - Player names are unique within a session
//! - A stored transaction set always passed validation against the current players
//! - Any player change discards the stored transaction set

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod file_store;
pub mod service;
pub mod storage;
pub mod sweeper;
pub mod types;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use export::{ExportRow, ExportSink, SheetFileSink, TrackSheet};
pub use file_store::FileStore;
pub use service::{NewPlayer, PlayerUpdate, SessionService};
pub use storage::{MemoryStore, SessionStore};
pub use sweeper::spawn_expiry_sweeper;
pub use types::{Player, PlayerStatus, Session, SessionId, SessionStatus};
