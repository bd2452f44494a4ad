//! Checkpointed backfill walker.
//!
//! Walks a channel's paginated history exactly once per item across
//! restarts: the checkpoint is advanced after every ingested item, so an
//! interruption loses at most the in-flight message, never a whole page.

use futures::StreamExt;
use rollcall_database::{LedgerRepository, ServerIdentity};
use rollcall_error::GatewayError;
use tracing::{debug, info, instrument, warn};

use crate::ingest::ingest_message;
use crate::source::HistorySource;

/// Walker phase for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum WalkState {
    /// No checkpoint row exists; the full history will be drained.
    #[display("no checkpoint")]
    NoCheckpoint,
    /// Resuming strictly after a stored checkpoint.
    #[display("resuming after {}", _0)]
    Resuming(i64),
    /// Consuming the history stream.
    #[display("draining")]
    Draining,
    /// The stream is exhausted.
    #[display("done")]
    Done,
}

/// Why a channel walk stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AbandonReason {
    /// The bot cannot read this channel; not fatal for the overall scan.
    #[display("forbidden")]
    Forbidden,
    /// The channel no longer exists.
    #[display("not found")]
    NotFound,
    /// A transient failure ended this attempt; the channel resumes from its
    /// checkpoint on the next run.
    #[display("transient")]
    Transient,
}

impl AbandonReason {
    fn classify(err: &GatewayError) -> Self {
        use rollcall_error::GatewayErrorKind;
        match err.kind() {
            GatewayErrorKind::Forbidden => Self::Forbidden,
            GatewayErrorKind::NotFound => Self::NotFound,
            _ => Self::Transient,
        }
    }
}

/// Result of walking one channel. Never an error: every failure mode is a
/// skip, not an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The history stream was drained to the end.
    Completed {
        /// Messages ingested during this walk.
        messages: u64,
    },
    /// The walk stopped early; checkpoint reflects the last ingested item.
    Abandoned {
        /// Messages ingested before stopping.
        messages: u64,
        /// Why the walk stopped.
        reason: AbandonReason,
    },
}

impl WalkOutcome {
    /// Messages ingested during the walk, however it ended.
    pub fn messages(&self) -> u64 {
        match self {
            Self::Completed { messages } | Self::Abandoned { messages, .. } => *messages,
        }
    }
}

/// Drives checkpointed traversal of channels for one server.
pub struct BackfillWalker<'a, S: HistorySource + ?Sized> {
    source: &'a S,
    ledger: &'a LedgerRepository,
    server: ServerIdentity,
}

impl<'a, S: HistorySource + ?Sized> BackfillWalker<'a, S> {
    /// Build a walker for `server`, reading history from `source` and
    /// writing through `ledger`.
    pub fn new(source: &'a S, ledger: &'a LedgerRepository, server: ServerIdentity) -> Self {
        Self {
            source,
            ledger,
            server,
        }
    }

    /// Walk one channel from its checkpoint to the present.
    #[instrument(skip(self), fields(server_id = self.server.id))]
    pub async fn walk_channel(&self, channel_id: i64) -> WalkOutcome {
        let after = match self.ledger.checkpoint(channel_id).await {
            Ok(cp) => cp,
            Err(err) => {
                warn!(%err, "checkpoint read failed, ending attempt");
                return WalkOutcome::Abandoned {
                    messages: 0,
                    reason: AbandonReason::Transient,
                };
            }
        };
        let state = match after {
            None => WalkState::NoCheckpoint,
            Some(id) => WalkState::Resuming(id),
        };
        debug!(%state, "entering channel walk");

        let mut stream = match self.source.history(channel_id, after).await {
            Ok(stream) => stream,
            Err(err) => {
                let reason = AbandonReason::classify(&err);
                debug!(%err, %reason, "history unavailable, abandoning channel");
                return WalkOutcome::Abandoned {
                    messages: 0,
                    reason,
                };
            }
        };

        let mut messages = 0;
        while let Some(item) = stream.next().await {
            let message = match item {
                Ok(message) => message,
                Err(err) => {
                    let reason = AbandonReason::classify(&err);
                    debug!(%err, %reason, messages, "stream error, ending attempt");
                    return WalkOutcome::Abandoned { messages, reason };
                }
            };

            ingest_message(self.source, self.ledger, &self.server, channel_id, &message).await;
            // Checkpoint per item, not per page: an interruption here loses
            // at most the next message.
            if let Err(err) = self.ledger.set_checkpoint(channel_id, message.id).await {
                warn!(%err, message = message.id, "checkpoint write failed");
            }
            messages += 1;
        }

        debug!(messages, state = %WalkState::Done, "channel drained");
        WalkOutcome::Completed { messages }
    }

    /// Walk a server's channels sequentially (never concurrently, to avoid
    /// stacking rate-limit pressure on one server).
    pub async fn walk_channels(&self, channel_ids: &[i64]) -> u64 {
        let mut total = 0;
        for &channel_id in channel_ids {
            let outcome = self.walk_channel(channel_id).await;
            match outcome {
                WalkOutcome::Completed { messages } => {
                    info!(channel_id, messages, "channel backfill complete");
                }
                WalkOutcome::Abandoned { messages, reason } => {
                    info!(channel_id, messages, %reason, "channel backfill abandoned");
                }
            }
            total += outcome.messages();
        }
        total
    }
}
