//! Database connection utilities.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use rollcall_error::{DatabaseError, DatabaseErrorKind, DatabaseResult};

/// Embedded schema migrations, applied on connect.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Establish a connection to the SQLite database at `database_url`.
///
/// Enables foreign keys and runs any pending migrations. Pass `:memory:`
/// for an ephemeral store (used by the test suite).
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a migration fails.
pub fn establish_connection(database_url: &str) -> DatabaseResult<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;

    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;

    Ok(conn)
}
