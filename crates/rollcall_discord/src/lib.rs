//! Discord integration for Rollcall.
//!
//! Adapts the serenity gateway and HTTP API to the scan engine:
//!
//! - **client**: serenity client setup and lifecycle management
//! - **handler**: live event router implementing serenity's `EventHandler`
//! - **gateway**: paginated history and reaction-user adapters implementing
//!   the scan engine's `HistorySource` seam
//! - **backfill**: per-server orchestration (channel walks, boost roster)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backfill;
mod client;
mod gateway;
mod handler;

pub use client::RollcallBot;
pub use gateway::SerenityHistory;
pub use handler::{HEARTBEAT_INTERVAL, RollcallHandler, ScanMode};
