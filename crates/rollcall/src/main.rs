//! Rollcall CLI binary.
//!
//! Startup flow: resolve configuration (flags, env, or interactive prompt),
//! open the ledger, then either run the operator console on a worker thread
//! or connect to the gateway for backfill plus live tracking.

use clap::Parser;
use rollcall_database::{DiscoveryLog, LedgerRepository};
use rollcall_discord::{RollcallBot, ScanMode};
use rollcall_error::{ConfigError, RollcallResult};

mod cli;
mod console;

use cli::{Cli, Mode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_spec = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env_spec.as_deref(), cli.verbose))
        .with_target(false)
        .init();

    let ledger = LedgerRepository::open(&cli.database, DiscoveryLog::new(&cli.discovery_log))?;

    // Mode selection may block on stdin; keep it off the scheduler thread.
    let (mode_arg, guild_arg) = (cli.mode, cli.guild);
    let mode = tokio::task::spawn_blocking(move || cli::resolve_mode(mode_arg, guild_arg)).await??;

    match mode {
        Mode::Console => {
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || console::run(handle, ledger)).await?;
        }
        Mode::Guild(id) => run_bot(ledger, ScanMode::Guild(id)).await?,
        Mode::All => run_bot(ledger, ScanMode::All).await?,
    }

    Ok(())
}

/// Log filter from `RUST_LOG` when set, otherwise from the verbosity flag.
fn log_filter(env_spec: Option<&str>, verbose: bool) -> tracing_subscriber::EnvFilter {
    match env_spec {
        Some(spec) => tracing_subscriber::EnvFilter::new(spec),
        None if verbose => tracing_subscriber::EnvFilter::new("debug"),
        None => tracing_subscriber::EnvFilter::new("info"),
    }
}

async fn run_bot(ledger: LedgerRepository, mode: ScanMode) -> RollcallResult<()> {
    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| ConfigError::new("DISCORD_TOKEN not set in environment or .env"))?;
    let mut bot = RollcallBot::new(token, ledger, mode).await?;
    bot.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::log_filter;

    #[test]
    fn env_spec_wins_over_verbosity_flag() {
        assert_eq!(
            log_filter(Some("rollcall=trace"), false).to_string(),
            "rollcall=trace"
        );
        assert_eq!(log_filter(None, true).to_string(), "debug");
        assert_eq!(log_filter(None, false).to_string(), "info");
    }
}
