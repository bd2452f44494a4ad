//! Checkpointed scan engine for Rollcall.
//!
//! Platform-agnostic core of the harvest pipeline: the [`HistorySource`]
//! seam over paginated history, the [`BackfillWalker`] that drains a channel
//! exactly once per item across restarts, the shared per-item ingestion
//! procedure, and the [`Heartbeat`] liveness signal.
//!
//! The Discord adapter lives in `rollcall_discord`; this crate is tested
//! against vector-backed sources.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod heartbeat;
mod ingest;
mod source;
mod walker;

pub use heartbeat::{Heartbeat, HeartbeatGuard};
pub use ingest::{ingest_message, sweep_roster};
pub use source::{Actor, HistoryMessage, HistorySource, MessageStream, ReactionSummary};
pub use walker::{AbandonReason, BackfillWalker, WalkOutcome, WalkState};
