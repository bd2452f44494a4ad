//! Operator console.
//!
//! A synchronous, blocking request/response loop over the ledger,
//! independent of the ingestion pipeline. Runs on its own worker thread and
//! bridges to the async repository through a runtime handle, so console I/O
//! never blocks the scheduler the scan tasks share.

use rollcall_database::LedgerRepository;
use std::io::{BufRead, Write};
use tokio::runtime::Handle;

const MENU: &str = "\n===== SEARCH / TOOLS =====\n\
1) Show total unique users\n\
2) Search user by ID or name\n\
3) Check duplicates in DB\n\
4) Check duplicates in discovery log\n\
5) Remove duplicates from DB\n\
6) Remove duplicates from discovery log\n\
7) Exit menu\n\
8) Remove users by server ID";

/// Run the console loop until the operator exits or stdin closes.
pub fn run(handle: Handle, ledger: LedgerRepository) {
    let stdin = std::io::stdin();
    loop {
        println!("{MENU}");
        let Some(choice) = read_line(&stdin, "> ") else {
            break;
        };
        match choice.as_str() {
            "1" => match handle.block_on(ledger.count_users()) {
                Ok(total) => println!("Total unique users (DB): {total}"),
                Err(err) => println!("Error: {err}"),
            },
            "2" => {
                let Some(query) = read_line(&stdin, "Enter user ID or part of username: ") else {
                    break;
                };
                match handle.block_on(ledger.search_users(&query)) {
                    Ok(hits) if hits.is_empty() => println!("No match"),
                    Ok(hits) => {
                        for hit in hits {
                            println!("{} ({})", hit.user.username, hit.user.id);
                            if hit.servers.is_empty() {
                                println!("Servers: None");
                            } else {
                                println!("Servers: {}", hit.servers.join(", "));
                            }
                        }
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
            "3" => match handle.block_on(ledger.duplicate_user_ids()) {
                Ok(dupes) if dupes.is_empty() => println!("No duplicates in DB"),
                Ok(dupes) => println!("Duplicates found in DB: {dupes:?}"),
                Err(err) => println!("Error: {err}"),
            },
            "4" => match ledger.discovery_log().duplicate_ids() {
                Ok(dupes) => println!("Duplicate lines in discovery log: {}", dupes.len()),
                Err(err) => println!("Error: {err}"),
            },
            "5" => {
                if confirmed(&stdin, "Type YES to remove duplicate user rows from DB: ") {
                    match handle.block_on(ledger.purge_duplicate_users()) {
                        Ok(removed) => println!("Removed {removed} duplicate DB rows"),
                        Err(err) => println!("Error: {err}"),
                    }
                }
            }
            "6" => {
                if confirmed(
                    &stdin,
                    "Type YES to dedupe the discovery log (keep first occurrence per user): ",
                ) {
                    match ledger.discovery_log().dedupe() {
                        Ok(kept) => println!("Cleaned discovery log; entries kept: {kept}"),
                        Err(err) => println!("Error: {err}"),
                    }
                }
            }
            "7" => break,
            "8" => {
                let Some(raw) = read_line(&stdin, "Enter server ID to purge: ") else {
                    break;
                };
                match raw.parse::<i64>() {
                    Ok(server_id) => match handle.block_on(ledger.purge_server(server_id)) {
                        Ok(summary) => println!(
                            "Removed {} memberships and {} orphaned users for server {server_id}",
                            summary.memberships_removed, summary.users_removed
                        ),
                        Err(err) => println!("Error while purging server: {err}"),
                    },
                    Err(_) => println!("Invalid server id"),
                }
            }
            _ => println!("Invalid option"),
        }
    }
}

fn confirmed(stdin: &std::io::Stdin, prompt: &str) -> bool {
    read_line(stdin, prompt).is_some_and(|answer| answer == "YES")
}

fn read_line(stdin: &std::io::Stdin, prompt: &str) -> Option<String> {
    print!("{prompt}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    let read = stdin.lock().read_line(&mut line).ok()?;
    if read == 0 {
        // EOF: treat as exit
        return None;
    }
    Some(line.trim().to_string())
}
