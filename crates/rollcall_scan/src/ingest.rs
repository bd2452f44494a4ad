//! Per-item ingestion, shared by the backfill walker and the live router.

use rollcall_database::{LedgerRepository, ServerIdentity, Sighting};
use std::time::Duration;
use tracing::debug;

use crate::source::{Actor, HistoryMessage, HistorySource};

/// Pause after a failed reaction-user enumeration before moving on.
pub(crate) const REACTION_BACKOFF: Duration = Duration::from_secs(1);

/// Record the author and every reactor of one message.
///
/// The author is skipped when automated; each reaction's user list is an
/// independent paginated lookup whose failure is absorbed with a brief
/// backoff so one bad reaction cannot abort the message, let alone the
/// channel.
pub async fn ingest_message<S: HistorySource + ?Sized>(
    source: &S,
    ledger: &LedgerRepository,
    server: &ServerIdentity,
    channel_id: i64,
    message: &HistoryMessage,
) {
    if !message.author.automated {
        let sighting = Sighting::new(
            message.author.id,
            message.author.label.clone(),
            format!("sent message id={}", message.id),
        )
        .in_server(server.clone());
        ledger.record_sighting(&sighting).await;
    }

    for reaction in &message.reactions {
        match source
            .reaction_users(channel_id, message.id, &reaction.emoji)
            .await
        {
            Ok(reactors) => {
                for reactor in reactors.iter().filter(|actor| !actor.automated) {
                    let sighting = Sighting::new(
                        reactor.id,
                        reactor.label.clone(),
                        format!("reacted {}", reaction.emoji),
                    )
                    .in_server(server.clone());
                    ledger.record_sighting(&sighting).await;
                }
            }
            Err(err) => {
                debug!(%err, message = message.id, emoji = %reaction.emoji,
                    "reaction user enumeration failed, skipping");
                tokio::time::sleep(REACTION_BACKOFF).await;
            }
        }
    }
}

/// Record a roster of members (e.g. boost subscribers) as plain sightings
/// with no channel or checkpoint semantics.
pub async fn sweep_roster(
    ledger: &LedgerRepository,
    server: &ServerIdentity,
    roster: &[Actor],
    action: &str,
) {
    for member in roster.iter().filter(|actor| !actor.automated) {
        let sighting =
            Sighting::new(member.id, member.label.clone(), action).in_server(server.clone());
        ledger.record_sighting(&sighting).await;
    }
}
