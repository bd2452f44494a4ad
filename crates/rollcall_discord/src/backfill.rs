//! Per-server backfill orchestration.

use rollcall_database::LedgerRepository;
use rollcall_scan::{Actor, BackfillWalker, Heartbeat, sweep_roster};
use serenity::all::{ChannelType, Context, GuildId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::gateway::{SerenityHistory, actor_from_user};
use crate::handler::server_identity;

/// Walk every target guild sequentially under one heartbeat guard, then
/// leave live tracking to the event handler.
pub(crate) async fn run_backfill(
    ctx: Context,
    ledger: LedgerRepository,
    guilds: Vec<GuildId>,
    heartbeat_interval: Duration,
) {
    let guard = Heartbeat::spawn(ledger.clone(), heartbeat_interval);
    for guild_id in guilds {
        scan_guild(&ctx, &ledger, guild_id).await;
    }
    guard.shutdown().await;
    info!("initial scan complete, live tracking continues");
}

/// Upsert the server row, walk its text channels sequentially, then sweep
/// the boost roster as plain sightings.
#[instrument(skip(ctx, ledger), fields(guild_id = guild_id.get()))]
async fn scan_guild(ctx: &Context, ledger: &LedgerRepository, guild_id: GuildId) {
    let server = server_identity(ctx, guild_id);
    if let Err(err) = ledger.upsert_server(&server).await {
        warn!(%err, "server upsert failed");
    }

    let channels = match guild_id.channels(&ctx.http).await {
        Ok(channels) => channels,
        Err(err) => {
            warn!(%err, "channel enumeration failed, skipping guild");
            return;
        }
    };
    let mut ordered: Vec<(u16, i64)> = channels
        .values()
        .filter(|channel| channel.kind == ChannelType::Text)
        .map(|channel| (channel.position, channel.id.get() as i64))
        .collect();
    ordered.sort_unstable();
    let channel_ids: Vec<i64> = ordered.into_iter().map(|(_, id)| id).collect();

    let source = SerenityHistory::new(Arc::clone(&ctx.http));
    let walker = BackfillWalker::new(&source, ledger, server.clone());
    let messages = walker.walk_channels(&channel_ids).await;
    info!(messages, channels = channel_ids.len(), "guild backfill finished");

    let boosters: Vec<Actor> = ctx
        .cache
        .guild(guild_id)
        .map(|guild| {
            guild
                .members
                .values()
                .filter(|member| member.premium_since.is_some())
                .map(|member| actor_from_user(&member.user))
                .collect()
        })
        .unwrap_or_default();
    sweep_roster(ledger, &server, &boosters, "is a booster").await;
}
