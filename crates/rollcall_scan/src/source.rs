//! Platform seam for historical traversal.
//!
//! The walker and ingestion procedure operate on these types; the Discord
//! crate adapts serenity pagination to them, and the test suite substitutes
//! vector-backed sources.

use async_trait::async_trait;
use futures::stream::BoxStream;
use rollcall_error::GatewayResult;

/// A user as observed on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Stable platform-assigned id.
    pub id: i64,
    /// Human-readable label.
    pub label: String,
    /// True for bot/system accounts, which never enter the ledger.
    pub automated: bool,
}

impl Actor {
    /// Build a human actor.
    pub fn human(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            automated: false,
        }
    }

    /// Build an automated actor.
    pub fn automated(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            automated: true,
        }
    }
}

/// A reaction attached to a historical message. Only the emoji is needed;
/// the users who placed it are a separate paginated lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    /// Emoji rendering, e.g. `👍` or `<:blob:1234>`.
    pub emoji: String,
}

/// One item of a channel's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    /// Message id; a total order within the channel.
    pub id: i64,
    /// The message author.
    pub author: Actor,
    /// Reactions already attached to the message.
    pub reactions: Vec<ReactionSummary>,
}

/// Lazy sequence of history items in strictly increasing id order.
pub type MessageStream<'a> = BoxStream<'a, GatewayResult<HistoryMessage>>;

/// Paginated access to a channel's past, oldest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Stream the history of `channel_id` in ascending id order; when `after`
    /// is given, only items with id strictly greater are produced.
    async fn history(&self, channel_id: i64, after: Option<i64>)
    -> GatewayResult<MessageStream<'_>>;

    /// Every user who placed `emoji` on the given message.
    async fn reaction_users(
        &self,
        channel_id: i64,
        message_id: i64,
        emoji: &str,
    ) -> GatewayResult<Vec<Actor>>;
}
