//! Serenity-backed implementation of the scan engine's history seam.
//!
//! Discord's message endpoint returns newest-first pages; the adapter
//! re-anchors with `after` and sorts each page so the walker sees a single
//! ascending lazy sequence, matching the `HistorySource` contract.

use async_stream::try_stream;
use async_trait::async_trait;
use rollcall_error::{GatewayError, GatewayErrorKind, GatewayResult};
use rollcall_scan::{Actor, HistoryMessage, HistorySource, MessageStream, ReactionSummary};
use serenity::all::{ChannelId, GetMessages, Message, MessageId, ReactionType, User, UserId};
use serenity::http::Http;
use std::sync::Arc;

/// Messages and reaction users fetched per request; the platform maximum.
const PAGE_SIZE: u8 = 100;

/// Paginated history access over the Discord HTTP API.
pub struct SerenityHistory {
    http: Arc<Http>,
}

impl SerenityHistory {
    /// Build an adapter over a shared HTTP client.
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HistorySource for SerenityHistory {
    async fn history(
        &self,
        channel_id: i64,
        after: Option<i64>,
    ) -> GatewayResult<MessageStream<'_>> {
        let http = Arc::clone(&self.http);
        // Snowflake ids are non-zero; anchor 1 walks the full history.
        let mut anchor = after.map_or(1, |id| id.max(1)) as u64;
        let stream = try_stream! {
            loop {
                let builder = GetMessages::new()
                    .after(MessageId::new(anchor))
                    .limit(PAGE_SIZE);
                let mut page = ChannelId::new(channel_id as u64)
                    .messages(&http, builder)
                    .await
                    .map_err(classify_gateway_error)?;
                if page.is_empty() {
                    break;
                }
                page.sort_unstable_by_key(|message| message.id.get());
                if let Some(newest) = page.last() {
                    anchor = newest.id.get();
                }
                for message in &page {
                    yield history_message(message);
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn reaction_users(
        &self,
        channel_id: i64,
        message_id: i64,
        emoji: &str,
    ) -> GatewayResult<Vec<Actor>> {
        let reaction = ReactionType::try_from(emoji).map_err(|err| {
            GatewayError::new(GatewayErrorKind::Api(format!(
                "unparseable emoji {emoji:?}: {err}"
            )))
        })?;
        let channel = ChannelId::new(channel_id as u64);
        let message = MessageId::new(message_id as u64);

        let mut reactors = Vec::new();
        let mut cursor: Option<UserId> = None;
        loop {
            let page = channel
                .reaction_users(
                    &self.http,
                    message,
                    reaction.clone(),
                    Some(PAGE_SIZE),
                    cursor,
                )
                .await
                .map_err(classify_gateway_error)?;
            let page_len = page.len();
            cursor = page.last().map(|user| user.id);
            reactors.extend(page.iter().map(actor_from_user));
            if page_len < PAGE_SIZE as usize {
                break;
            }
        }
        Ok(reactors)
    }
}

/// Map a serenity failure onto the scan engine's taxonomy: forbidden and
/// not-found abandon a channel, everything else is retried from the
/// checkpoint on a later run.
pub(crate) fn classify_gateway_error(err: serenity::Error) -> GatewayError {
    use serenity::http::HttpError;
    match &err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            match response.status_code.as_u16() {
                403 => GatewayError::new(GatewayErrorKind::Forbidden),
                404 => GatewayError::new(GatewayErrorKind::NotFound),
                429 => GatewayError::new(GatewayErrorKind::RateLimited),
                _ => GatewayError::new(GatewayErrorKind::Api(err.to_string())),
            }
        }
        serenity::Error::Gateway(_) => {
            GatewayError::new(GatewayErrorKind::Connection(err.to_string()))
        }
        _ => GatewayError::new(GatewayErrorKind::Api(err.to_string())),
    }
}

/// Convert a platform user into a scan actor.
pub(crate) fn actor_from_user(user: &User) -> Actor {
    Actor {
        id: user.id.get() as i64,
        label: user.tag(),
        automated: user.bot,
    }
}

/// Convert a full message into the walker's history item.
pub(crate) fn history_message(message: &Message) -> HistoryMessage {
    HistoryMessage {
        id: message.id.get() as i64,
        author: actor_from_user(&message.author),
        reactions: message
            .reactions
            .iter()
            .map(|reaction| ReactionSummary {
                emoji: reaction.reaction_type.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_carries_bot_flag() {
        let mut user = User::default();
        user.id = UserId::new(42);
        user.name = "helper".to_string();
        user.bot = true;
        let actor = actor_from_user(&user);
        assert_eq!(actor.id, 42);
        assert!(actor.automated);
    }

    #[test]
    fn unicode_emoji_round_trips_through_reaction_type() {
        let reaction = ReactionType::try_from("👍").unwrap();
        assert_eq!(reaction.to_string(), "👍");
    }

    #[test]
    fn unclassified_errors_map_to_api_kind() {
        let err = classify_gateway_error(serenity::Error::Other("boom"));
        assert_eq!(*err.kind(), GatewayErrorKind::Api("boom".to_string()));
    }
}
