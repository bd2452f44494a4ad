//! Live event router.
//!
//! Dispatches real-time gateway events into the same ingestion path the
//! backfill walker uses, and advances checkpoints opportunistically so a
//! live trickle keeps an idle channel's cursor fresh.

use rollcall_database::{LedgerRepository, ServerIdentity, Sighting};
use rollcall_error::ConfigError;
use serenity::all::{Context, EventHandler, GatewayIntents, GuildId, Member, Message, Presence, Reaction, Ready};
use serenity::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::backfill::run_backfill;

/// Heartbeat cadence while a backfill is active.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

/// Which servers the startup backfill covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Backfill a single server, then track live events.
    Guild(u64),
    /// Backfill every connected server, then track live events.
    All,
}

/// Serenity event handler wiring gateway events to the ledger.
pub struct RollcallHandler {
    ledger: LedgerRepository,
    mode: ScanMode,
    backfill_started: AtomicBool,
}

impl RollcallHandler {
    /// Build a handler that scans according to `mode` once the gateway is
    /// ready.
    pub fn new(ledger: LedgerRepository, mode: ScanMode) -> Self {
        Self {
            ledger,
            mode,
            backfill_started: AtomicBool::new(false),
        }
    }

    /// Gateway intents required by the router.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_PRESENCES
    }
}

/// Resolve the guilds a backfill should cover against the set the gateway
/// reports as connected. A target id that matches no connected guild is a
/// configuration error, fatal at startup.
pub(crate) fn backfill_targets(
    mode: ScanMode,
    connected: &[GuildId],
) -> Result<Vec<GuildId>, ConfigError> {
    match mode {
        ScanMode::Guild(id) => connected
            .iter()
            .copied()
            .find(|guild| guild.get() == id)
            .map(|guild| vec![guild])
            .ok_or_else(|| {
                ConfigError::new(format!("target server {id} not found among connected servers"))
            }),
        ScanMode::All => Ok(connected.to_vec()),
    }
}

/// Resolve a server identity from the cache, falling back to the raw id as
/// the label when the guild is not cached.
pub(crate) fn server_identity(ctx: &Context, guild_id: GuildId) -> ServerIdentity {
    let name = ctx
        .cache
        .guild(guild_id)
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| guild_id.to_string());
    ServerIdentity::new(guild_id.get() as i64, name)
}

#[async_trait]
impl EventHandler for RollcallHandler {
    #[instrument(skip(self, ctx, ready), fields(user = %ready.user.name))]
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("gateway connected");
        // Reconnects re-deliver ready; the backfill runs once per process.
        if self.backfill_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let connected: Vec<GuildId> = ready.guilds.iter().map(|guild| guild.id).collect();
        let guilds = match backfill_targets(self.mode, &connected) {
            Ok(guilds) => guilds,
            Err(err) => {
                error!(%err, "shutting down");
                ctx.shard.shutdown_clean();
                return;
            }
        };
        let ledger = self.ledger.clone();
        tokio::spawn(run_backfill(ctx, ledger, guilds, HEARTBEAT_INTERVAL));
    }

    async fn message(&self, ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }
        let Some(guild_id) = message.guild_id else {
            return;
        };
        let sighting = Sighting::new(
            message.author.id.get() as i64,
            message.author.tag(),
            format!("sent message id={}", message.id),
        )
        .in_server(server_identity(&ctx, guild_id));
        self.ledger.record_sighting(&sighting).await;

        if let Err(err) = self
            .ledger
            .advance_checkpoint(
                message.channel_id.get() as i64,
                message.id.get() as i64,
            )
            .await
        {
            warn!(%err, "live checkpoint advance failed");
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let Some(guild_id) = reaction.guild_id else {
            return;
        };
        let user = match reaction.user(&ctx).await {
            Ok(user) => user,
            Err(err) => {
                debug!(%err, "reactor lookup failed, dropping event");
                return;
            }
        };
        if user.bot {
            return;
        }
        let sighting = Sighting::new(
            user.id.get() as i64,
            user.tag(),
            format!("reacted {} (live)", reaction.emoji),
        )
        .in_server(server_identity(&ctx, guild_id));
        self.ledger.record_sighting(&sighting).await;

        if let Err(err) = self
            .ledger
            .advance_checkpoint(
                reaction.channel_id.get() as i64,
                reaction.message_id.get() as i64,
            )
            .await
        {
            warn!(%err, "live checkpoint advance failed");
        }
    }

    async fn guild_member_addition(&self, ctx: Context, member: Member) {
        if member.user.bot {
            return;
        }
        let sighting = Sighting::new(
            member.user.id.get() as i64,
            member.user.tag(),
            "joined (live)",
        )
        .in_server(server_identity(&ctx, member.guild_id));
        self.ledger.record_sighting(&sighting).await;
    }

    async fn presence_update(&self, ctx: Context, presence: Presence) {
        if presence.user.bot.unwrap_or(false) {
            return;
        }
        let user_id = presence.user.id;
        // Presence updates may omit the guild; fall back to searching the
        // connected guilds for one containing this member.
        let guild_id = presence.guild_id.or_else(|| {
            ctx.cache.guilds().into_iter().find(|candidate| {
                ctx.cache
                    .guild(*candidate)
                    .is_some_and(|guild| guild.members.contains_key(&user_id))
            })
        });
        let Some(guild_id) = guild_id else {
            return;
        };
        let label = presence
            .user
            .name
            .clone()
            .or_else(|| ctx.cache.user(user_id).map(|user| user.tag()))
            .unwrap_or_else(|| user_id.to_string());
        let sighting = Sighting::new(
            user_id.get() as i64,
            label,
            format!("presence {}", presence.status.name()),
        )
        .in_server(server_identity(&ctx, guild_id));
        self.ledger.record_sighting(&sighting).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_guild_must_be_connected() {
        let connected = vec![GuildId::new(700), GuildId::new(701)];

        let guilds = backfill_targets(ScanMode::Guild(701), &connected).unwrap();
        assert_eq!(guilds, vec![GuildId::new(701)]);

        let err = backfill_targets(ScanMode::Guild(999), &connected).unwrap_err();
        assert!(err.message.contains("999"));
    }

    #[test]
    fn all_mode_covers_every_connected_guild() {
        let connected = vec![GuildId::new(700), GuildId::new(701)];
        let guilds = backfill_targets(ScanMode::All, &connected).unwrap();
        assert_eq!(guilds, connected);

        assert!(backfill_targets(ScanMode::All, &[]).unwrap().is_empty());
    }

    #[test]
    fn unconnected_target_is_fatal_even_for_id_zero() {
        let connected = vec![GuildId::new(700)];
        assert!(backfill_targets(ScanMode::Guild(0), &connected).is_err());
    }
}
