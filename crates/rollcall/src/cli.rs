//! Command-line interface and startup mode selection.

use clap::{Parser, ValueEnum};
use rollcall_error::{ConfigError, RollcallResult};
use std::io::Write;

/// Passive Discord user tracker with checkpointed backfill.
#[derive(Debug, Parser)]
#[command(name = "rollcall", version, about)]
pub struct Cli {
    /// Scan mode; prompts interactively when omitted
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Target server id (guild mode)
    #[arg(long)]
    pub guild: Option<u64>,

    /// SQLite database path
    #[arg(long, default_value = "users.db")]
    pub database: String,

    /// Discovery log path
    #[arg(long, default_value = "logs.txt")]
    pub discovery_log: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Scan mode flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Backfill one server, then track live events
    Guild,
    /// Backfill every connected server, then track live events
    All,
    /// Operator console only, no gateway connection
    Console,
}

/// Fully resolved run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Single-target backfill plus live tracking.
    Guild(u64),
    /// All-servers backfill plus live tracking.
    All,
    /// Operator console only.
    Console,
}

/// Resolve the run mode from flags, prompting interactively when `--mode`
/// was omitted. Invalid choices and unparseable ids are fatal.
pub fn resolve_mode(mode: Option<ModeArg>, guild: Option<u64>) -> RollcallResult<Mode> {
    match mode {
        Some(ModeArg::All) => Ok(Mode::All),
        Some(ModeArg::Console) => Ok(Mode::Console),
        Some(ModeArg::Guild) => {
            let id = guild
                .ok_or_else(|| ConfigError::new("--guild <id> is required with --mode guild"))?;
            Ok(Mode::Guild(require_nonzero(id)?))
        }
        None => prompt_mode(guild),
    }
}

fn prompt_mode(guild: Option<u64>) -> RollcallResult<Mode> {
    println!("Mode: 1 → target server scan + live, 2 → all servers scan + live, s → console tools");
    let choice = read_prompt("> ")?;
    match parse_mode_choice(&choice) {
        Some(ModeArg::Guild) => {
            let id = match guild {
                Some(id) => id,
                None => parse_guild_id(&read_prompt("Enter target server ID: ")?)?,
            };
            Ok(Mode::Guild(require_nonzero(id)?))
        }
        Some(ModeArg::All) => Ok(Mode::All),
        Some(ModeArg::Console) => Ok(Mode::Console),
        None => Err(ConfigError::new(format!("invalid mode choice: {choice:?}")).into()),
    }
}

/// Map a menu answer onto a mode; `None` for anything unrecognized.
pub(crate) fn parse_mode_choice(choice: &str) -> Option<ModeArg> {
    match choice.trim().to_lowercase().as_str() {
        "1" => Some(ModeArg::Guild),
        "2" => Some(ModeArg::All),
        "s" => Some(ModeArg::Console),
        _ => None,
    }
}

/// Parse a server id; unparseable input is a fatal configuration error.
/// Platform ids are non-zero snowflakes, so zero is rejected too.
pub(crate) fn parse_guild_id(input: &str) -> RollcallResult<u64> {
    match input.trim().parse() {
        Ok(id) => require_nonzero(id),
        Err(_) => Err(ConfigError::new(format!("invalid server id: {input:?}")).into()),
    }
}

pub(crate) fn require_nonzero(id: u64) -> RollcallResult<u64> {
    if id == 0 {
        Err(ConfigError::new("invalid server id: 0").into())
    } else {
        Ok(id)
    }
}

fn read_prompt(prompt: &str) -> RollcallResult<String> {
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .map_err(|err| ConfigError::new(err.to_string()))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|err| ConfigError::new(err.to_string()))?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_choices_parse() {
        assert_eq!(parse_mode_choice("1"), Some(ModeArg::Guild));
        assert_eq!(parse_mode_choice(" 2\n"), Some(ModeArg::All));
        assert_eq!(parse_mode_choice("S"), Some(ModeArg::Console));
        assert_eq!(parse_mode_choice("9"), None);
        assert_eq!(parse_mode_choice(""), None);
    }

    #[test]
    fn guild_ids_parse_or_fail_fatally() {
        assert_eq!(parse_guild_id(" 123456789\n").unwrap(), 123456789);
        assert!(parse_guild_id("not a number").is_err());
        assert!(parse_guild_id("0").is_err());
    }

    #[test]
    fn explicit_guild_mode_requires_id() {
        assert!(resolve_mode(Some(ModeArg::Guild), None).is_err());
        assert_eq!(
            resolve_mode(Some(ModeArg::Guild), Some(7)).unwrap(),
            Mode::Guild(7)
        );
        assert_eq!(resolve_mode(Some(ModeArg::All), None).unwrap(), Mode::All);
    }

    #[test]
    fn zero_guild_flag_is_a_config_error() {
        assert!(resolve_mode(Some(ModeArg::Guild), Some(0)).is_err());
    }
}
