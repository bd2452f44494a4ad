//! SQLite persistence for Rollcall.
//!
//! This crate provides the identity ledger (users, servers, memberships),
//! the per-channel checkpoint store, and the append-only discovery log.
//!
//! # Example
//!
//! ```rust,no_run
//! use rollcall_database::{DiscoveryLog, LedgerRepository, Sighting, ServerIdentity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = LedgerRepository::open("users.db", DiscoveryLog::new("logs.txt"))?;
//! let sighting = Sighting::new(42, "alice", "sent message id=7")
//!     .in_server(ServerIdentity::new(7, "Hub"));
//! let discovery = ledger.record_sighting(&sighting).await;
//! assert!(discovery.is_new());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod connection;
mod discovery;
mod models;
mod repository;

/// Diesel table definitions.
pub mod schema;

pub use connection::{MIGRATIONS, establish_connection};
pub use discovery::{DiscoveryLog, extract_user_id};
pub use models::{CheckpointRow, MembershipRow, ServerRow, UserRow};
pub use repository::{
    Discovery, LedgerRepository, PurgeSummary, ServerIdentity, Sighting, UserSearchHit,
};
