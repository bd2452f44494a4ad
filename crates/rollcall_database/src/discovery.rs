//! Append-only discovery log.
//!
//! One line is written per user's first insertion into the ledger, never on
//! later sightings. The file is a domain artifact, not tracing output: the
//! operator console reads it back for duplicate checks and deduplication.

use chrono::Utc;
use rollcall_error::DatabaseResult;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only text log of first-time user discoveries.
///
/// Line format: `{timestamp} - {label} ({id}) discovered in {server} --- {action}`.
#[derive(Debug, Clone)]
pub struct DiscoveryLog {
    path: PathBuf,
}

impl DiscoveryLog {
    /// Create a handle for the log file at `path`. The file is created on
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one discovery line.
    pub fn append(
        &self,
        label: &str,
        user_id: i64,
        server_label: &str,
        action: &str,
    ) -> DatabaseResult<()> {
        let line = format!(
            "{} - {} ({}) discovered in {} --- {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            label,
            user_id,
            server_label,
            action,
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// User ids that appear on more than one line, in first-repeat order.
    pub fn duplicate_ids(&self) -> DatabaseResult<Vec<String>> {
        let file = File::open(&self.path)?;
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some(id) = extract_user_id(&line)
                && !seen.insert(id.to_string())
            {
                dupes.push(id.to_string());
            }
        }
        Ok(dupes)
    }

    /// Rewrite the log keeping only the first line per user id. Lines without
    /// a recognizable id are kept as-is. Returns the number of lines kept.
    pub fn dedupe(&self) -> DatabaseResult<usize> {
        let file = File::open(&self.path)?;
        let mut seen = std::collections::HashSet::new();
        let mut kept = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some(id) = extract_user_id(&line) {
                if !seen.insert(id.to_string()) {
                    continue;
                }
            }
            kept.push(line);
        }
        let mut out = File::create(&self.path)?;
        for line in &kept {
            writeln!(out, "{}", line)?;
        }
        Ok(kept.len())
    }
}

/// Extract the user id from a discovery line: the last parenthesized group
/// before the `discovered in` separator. Anchoring on the separator keeps
/// actions containing parentheses (e.g. `joined (live)`) from being
/// mistaken for the id.
pub fn extract_user_id(line: &str) -> Option<&str> {
    let head = &line[..line.find(" discovered in ")?];
    let start = head.rfind('(')?;
    let rest = &head[start + 1..];
    let end = rest.find(')')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, DiscoveryLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = DiscoveryLog::new(dir.path().join("logs.txt"));
        (dir, log)
    }

    #[test]
    fn extract_user_id_ignores_parens_in_action() {
        let line = "2024-01-01 00:00:00 - alice (42) discovered in Hub --- joined (live)";
        assert_eq!(extract_user_id(line), Some("42"));
    }

    #[test]
    fn extract_user_id_takes_group_nearest_separator() {
        let line = "2024-01-01 00:00:00 - alice (smith) (42) discovered in Hub --- sent message id=7";
        assert_eq!(extract_user_id(line), Some("42"));
        assert_eq!(extract_user_id("no separator here"), None);
    }

    #[test]
    fn append_and_dedupe_keeps_first_occurrence() {
        let (_dir, log) = temp_log();
        log.append("alice", 1, "Hub", "sent message id=10").unwrap();
        log.append("bob", 2, "Hub", "sent message id=11").unwrap();
        log.append("alice", 1, "Hub", "reacted 👍").unwrap();

        assert_eq!(log.duplicate_ids().unwrap(), vec!["1".to_string()]);

        let kept = log.dedupe().unwrap();
        assert_eq!(kept, 2);
        assert!(log.duplicate_ids().unwrap().is_empty());

        let body = std::fs::read_to_string(log.path()).unwrap();
        assert!(body.contains("sent message id=10"));
        assert!(!body.contains("reacted"));
    }

    #[test]
    fn duplicate_ids_on_clean_log_is_empty() {
        let (_dir, log) = temp_log();
        log.append("alice", 1, "Hub", "joined (live)").unwrap();
        assert!(log.duplicate_ids().unwrap().is_empty());
    }
}
