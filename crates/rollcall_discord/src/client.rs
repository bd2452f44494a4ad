//! Discord client setup and lifecycle management.

use rollcall_database::LedgerRepository;
use rollcall_error::{GatewayError, GatewayErrorKind, GatewayResult};
use serenity::Client;
use tracing::{info, instrument};

use crate::handler::{RollcallHandler, ScanMode};

/// Gateway client for Rollcall.
///
/// Connects to Discord, runs the configured startup backfill, and keeps
/// routing live events into the ledger until shut down.
///
/// # Example
/// ```no_run
/// use rollcall_database::{DiscoveryLog, LedgerRepository};
/// use rollcall_discord::{RollcallBot, ScanMode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let token = std::env::var("DISCORD_TOKEN")?;
///     let ledger = LedgerRepository::open("users.db", DiscoveryLog::new("logs.txt"))?;
///     let mut bot = RollcallBot::new(token, ledger, ScanMode::All).await?;
///     bot.start().await?;
///     Ok(())
/// }
/// ```
pub struct RollcallBot {
    client: Client,
}

impl RollcallBot {
    /// Create a new bot instance.
    ///
    /// # Errors
    /// Returns an error if the serenity client fails to initialize.
    #[instrument(skip(token, ledger), fields(token_len = token.len()))]
    pub async fn new(
        token: String,
        ledger: LedgerRepository,
        mode: ScanMode,
    ) -> GatewayResult<Self> {
        let handler = RollcallHandler::new(ledger, mode);
        let intents = RollcallHandler::intents();
        info!(?intents, "building gateway client");

        let client = Client::builder(&token, intents)
            .event_handler(handler)
            .await
            .map_err(|err| {
                GatewayError::new(GatewayErrorKind::Connection(format!(
                    "failed to build client: {err}"
                )))
            })?;

        Ok(Self { client })
    }

    /// Start the bot. Blocks until the gateway connection ends.
    ///
    /// # Errors
    /// Returns an error if the client stops with a fatal gateway failure.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> GatewayResult<()> {
        info!("starting gateway client");
        self.client.start().await.map_err(|err| {
            GatewayError::new(GatewayErrorKind::Connection(format!("client error: {err}")))
        })
    }
}
