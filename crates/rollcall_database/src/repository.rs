//! SQLite repository for the identity ledger and checkpoint store.
//!
//! The ledger is the sole writer of users, servers, memberships, and the
//! discovery log; the scan engine and live router write checkpoints through
//! it. The connection is shared behind a mutex so the operator console (a
//! second, blocking thread) serializes with the ingestion path through the
//! store rather than through application locks.

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rollcall_error::{DatabaseError, DatabaseResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::discovery::DiscoveryLog;
use crate::models::{MembershipRow, NewServer, NewUser, UserRow};
use crate::schema::{checkpoints, servers, user_servers, users};

/// One observed occurrence of a user performing an action in a server.
#[derive(Debug, Clone)]
pub struct Sighting {
    /// Stable platform-assigned user id.
    pub user_id: i64,
    /// Human-readable label at the time of the sighting.
    pub username: String,
    /// The server the sighting occurred in, when known.
    pub server: Option<ServerIdentity>,
    /// Free-text action descriptor, e.g. `sent message id=123`.
    pub action: String,
}

impl Sighting {
    /// Build a sighting with no server context.
    pub fn new(user_id: i64, username: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            server: None,
            action: action.into(),
        }
    }

    /// Attach the owning server.
    pub fn in_server(mut self, server: ServerIdentity) -> Self {
        self.server = Some(server);
        self
    }
}

/// Identity and display label of a server (guild).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    /// Stable platform-assigned server id.
    pub id: i64,
    /// Latest known display name.
    pub name: String,
}

impl ServerIdentity {
    /// Build a server identity.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Outcome of recording a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Discovery {
    /// First-ever sighting of this user; one discovery log line was written.
    #[display("new")]
    New,
    /// The user was already in the ledger; server and membership refreshed.
    #[display("known")]
    Known,
    /// Storage failed twice; the sighting was dropped.
    #[display("dropped")]
    Dropped,
}

impl Discovery {
    /// True for a first-ever sighting.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }
}

/// A user row together with the names of the servers it was seen in.
#[derive(Debug, Clone)]
pub struct UserSearchHit {
    /// The matched user.
    pub user: UserRow,
    /// Display names of every server this user holds a membership in.
    pub servers: Vec<String>,
}

/// Row counts removed by a per-server purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeSummary {
    /// Membership edges deleted.
    pub memberships_removed: usize,
    /// Users deleted because no membership remained elsewhere.
    pub users_removed: usize,
}

/// SQLite repository for users, servers, memberships, and checkpoints.
#[derive(Clone)]
pub struct LedgerRepository {
    conn: Arc<Mutex<SqliteConnection>>,
    log: DiscoveryLog,
}

impl LedgerRepository {
    /// Open the store at `database_url`, running migrations, and attach the
    /// discovery log.
    pub fn open(database_url: &str, log: DiscoveryLog) -> DatabaseResult<Self> {
        let conn = crate::connection::establish_connection(database_url)?;
        Ok(Self::from_connection(conn, log))
    }

    /// Wrap an already-established connection.
    pub fn from_connection(conn: SqliteConnection, log: DiscoveryLog) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            log,
        }
    }

    /// The attached discovery log.
    pub fn discovery_log(&self) -> &DiscoveryLog {
        &self.log
    }

    // ============================================================================
    // Identity Ledger
    // ============================================================================

    /// Record one sighting.
    ///
    /// A single transaction inserts the user if absent (the affected-row
    /// count of the conditional insert is the discovery test), upserts the
    /// server, and ensures the membership edge. The discovery log line is
    /// appended only after the transaction commits, and only when the user
    /// insert took effect.
    ///
    /// Sightings are advisory: storage failures roll back, are retried once
    /// statement-by-statement with idempotent upserts, and are dropped with a
    /// warning if the retry fails too. This method never returns an error.
    #[instrument(skip(self, sighting), fields(user_id = sighting.user_id))]
    pub async fn record_sighting(&self, sighting: &Sighting) -> Discovery {
        let outcome = {
            let mut conn = self.conn.lock().await;
            match Self::apply_sighting(&mut conn, sighting) {
                Ok(discovered) => Ok(discovered),
                Err(err) => {
                    warn!(%err, "sighting transaction failed, re-applying statements");
                    Self::reapply_sighting(&mut conn, sighting)
                }
            }
        };

        match outcome {
            Ok(true) => {
                let server_label = sighting
                    .server
                    .as_ref()
                    .map_or("Unknown", |server| server.name.as_str());
                if let Err(err) = self.log.append(
                    &sighting.username,
                    sighting.user_id,
                    server_label,
                    &sighting.action,
                ) {
                    warn!(%err, "discovery log append failed");
                }
                Discovery::New
            }
            Ok(false) => Discovery::Known,
            Err(err) => {
                warn!(%err, "sighting dropped");
                Discovery::Dropped
            }
        }
    }

    /// Store or refresh a server row. Name is always overwritten with the
    /// latest known value.
    #[instrument(skip(self, server), fields(server_id = server.id))]
    pub async fn upsert_server(&self, server: &ServerIdentity) -> DatabaseResult<()> {
        let mut conn = self.conn.lock().await;
        Self::upsert_server_stmt(&mut conn, server).map_err(DatabaseError::from)
    }

    /// Total distinct users in the ledger.
    pub async fn count_users(&self) -> DatabaseResult<i64> {
        let mut conn = self.conn.lock().await;
        users::table
            .count()
            .get_result(&mut *conn)
            .map_err(DatabaseError::from)
    }

    /// Search users by exact id or username substring, with the server names
    /// each match belongs to.
    #[instrument(skip(self))]
    pub async fn search_users(&self, query: &str) -> DatabaseResult<Vec<UserSearchHit>> {
        let mut conn = self.conn.lock().await;
        let pattern = format!("%{}%", query);
        let mut matches = users::table.into_boxed();
        matches = matches.filter(users::username.like(pattern));
        if let Ok(id) = query.parse::<i64>() {
            matches = matches.or_filter(users::id.eq(id));
        }
        let rows: Vec<UserRow> = matches.order(users::id.asc()).load(&mut *conn)?;

        let mut hits = Vec::with_capacity(rows.len());
        for user in rows {
            let server_names = user_servers::table
                .inner_join(servers::table)
                .filter(user_servers::user_id.eq(user.id))
                .select(servers::name)
                .order(servers::name.asc())
                .load(&mut *conn)?;
            hits.push(UserSearchHit {
                user,
                servers: server_names,
            });
        }
        Ok(hits)
    }

    /// User ids appearing more than once in the users table.
    ///
    /// The primary key makes this empty in a healthy store; the console keeps
    /// the check as an integrity probe for stores imported from elsewhere.
    pub async fn duplicate_user_ids(&self) -> DatabaseResult<Vec<i64>> {
        let mut conn = self.conn.lock().await;
        users::table
            .group_by(users::id)
            .having(count_star().gt(1))
            .select(users::id)
            .load(&mut *conn)
            .map_err(DatabaseError::from)
    }

    /// Remove every user row (and its memberships) whose id is duplicated.
    /// Returns the number of users removed.
    #[instrument(skip(self))]
    pub async fn purge_duplicate_users(&self) -> DatabaseResult<usize> {
        let duplicates = self.duplicate_user_ids().await?;
        if duplicates.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().await;
        conn.transaction::<usize, diesel::result::Error, _>(|conn| {
            diesel::delete(user_servers::table.filter(user_servers::user_id.eq_any(&duplicates)))
                .execute(conn)?;
            diesel::delete(users::table.filter(users::id.eq_any(&duplicates))).execute(conn)
        })
        .map_err(DatabaseError::from)
    }

    /// Purge a server: delete its memberships, delete users left with no
    /// membership anywhere, and delete the server row, all in one
    /// transaction.
    #[instrument(skip(self))]
    pub async fn purge_server(&self, server_id: i64) -> DatabaseResult<PurgeSummary> {
        let mut conn = self.conn.lock().await;
        conn.transaction::<PurgeSummary, diesel::result::Error, _>(|conn| {
            let members: Vec<i64> = user_servers::table
                .filter(user_servers::server_id.eq(server_id))
                .select(user_servers::user_id)
                .load(conn)?;

            let memberships_removed =
                diesel::delete(user_servers::table.filter(user_servers::server_id.eq(server_id)))
                    .execute(conn)?;

            let still_homed: HashSet<i64> = user_servers::table
                .filter(user_servers::user_id.eq_any(&members))
                .select(user_servers::user_id)
                .load::<i64>(conn)?
                .into_iter()
                .collect();
            let orphans: Vec<i64> = members
                .into_iter()
                .filter(|id| !still_homed.contains(id))
                .collect();

            let users_removed =
                diesel::delete(users::table.filter(users::id.eq_any(&orphans))).execute(conn)?;
            diesel::delete(servers::table.find(server_id)).execute(conn)?;

            Ok(PurgeSummary {
                memberships_removed,
                users_removed,
            })
        })
        .map_err(DatabaseError::from)
    }

    // ============================================================================
    // Checkpoint Store
    // ============================================================================

    /// Last processed message id for a channel, if any.
    pub async fn checkpoint(&self, channel_id: i64) -> DatabaseResult<Option<i64>> {
        let mut conn = self.conn.lock().await;
        checkpoints::table
            .find(channel_id)
            .select(checkpoints::last_message_id)
            .first(&mut *conn)
            .optional()
            .map_err(DatabaseError::from)
    }

    /// Upsert the checkpoint for a channel, last-write-wins.
    ///
    /// The backfill walker uses this: it already guarantees monotonically
    /// increasing delivery within a channel.
    #[instrument(skip(self))]
    pub async fn set_checkpoint(&self, channel_id: i64, message_id: i64) -> DatabaseResult<()> {
        let mut conn = self.conn.lock().await;
        diesel::insert_into(checkpoints::table)
            .values(crate::models::CheckpointRow {
                channel_id,
                last_message_id: message_id,
            })
            .on_conflict(checkpoints::channel_id)
            .do_update()
            .set(checkpoints::last_message_id.eq(message_id))
            .execute(&mut *conn)
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    /// Advance the checkpoint to `max(existing, message_id)`.
    ///
    /// The live router uses this so an out-of-order live event can never
    /// regress a cursor a backfill is still draining toward.
    #[instrument(skip(self))]
    pub async fn advance_checkpoint(&self, channel_id: i64, message_id: i64) -> DatabaseResult<()> {
        let mut conn = self.conn.lock().await;
        conn.transaction::<(), diesel::result::Error, _>(|conn| {
            let existing: Option<i64> = checkpoints::table
                .find(channel_id)
                .select(checkpoints::last_message_id)
                .first(conn)
                .optional()?;
            let next = existing.map_or(message_id, |current| current.max(message_id));
            diesel::insert_into(checkpoints::table)
                .values(crate::models::CheckpointRow {
                    channel_id,
                    last_message_id: next,
                })
                .on_conflict(checkpoints::channel_id)
                .do_update()
                .set(checkpoints::last_message_id.eq(next))
                .execute(conn)?;
            Ok(())
        })
        .map_err(DatabaseError::from)
    }

    // ============================================================================
    // Statement helpers (shared by the transactional and fallback paths)
    // ============================================================================

    fn apply_sighting(conn: &mut SqliteConnection, sighting: &Sighting) -> DatabaseResult<bool> {
        conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            let inserted = Self::insert_user_if_absent(conn, sighting)?;
            if !inserted {
                diesel::update(users::table.find(sighting.user_id))
                    .set(users::username.eq(&sighting.username))
                    .execute(conn)?;
            }
            if let Some(server) = &sighting.server {
                Self::upsert_server_stmt(conn, server)?;
                Self::ensure_membership(conn, sighting.user_id, server.id)?;
            }
            Ok(inserted)
        })
        .map_err(DatabaseError::from)
    }

    /// Best-effort fallback: the same statements, individually, outside a
    /// transaction. Every statement is an idempotent upsert, so a partial
    /// earlier failure cannot surface duplicate-key errors here.
    fn reapply_sighting(conn: &mut SqliteConnection, sighting: &Sighting) -> DatabaseResult<bool> {
        let inserted = Self::insert_user_if_absent(conn, sighting)?;
        if let Some(server) = &sighting.server {
            Self::upsert_server_stmt(conn, server)?;
            Self::ensure_membership(conn, sighting.user_id, server.id)?;
        }
        Ok(inserted)
    }

    /// Conditional insert; the row count reports whether this call created
    /// the user. This is the single atomic operation the discovery decision
    /// rests on, not a separate check-then-act.
    fn insert_user_if_absent(
        conn: &mut SqliteConnection,
        sighting: &Sighting,
    ) -> QueryResult<bool> {
        let inserted = diesel::insert_into(users::table)
            .values(NewUser {
                id: sighting.user_id,
                username: &sighting.username,
            })
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(inserted == 1)
    }

    fn upsert_server_stmt(conn: &mut SqliteConnection, server: &ServerIdentity) -> QueryResult<()> {
        diesel::insert_into(servers::table)
            .values(NewServer {
                id: server.id,
                name: &server.name,
            })
            .on_conflict(servers::id)
            .do_update()
            .set(servers::name.eq(&server.name))
            .execute(conn)?;
        Ok(())
    }

    fn ensure_membership(
        conn: &mut SqliteConnection,
        user_id: i64,
        server_id: i64,
    ) -> QueryResult<()> {
        diesel::insert_into(user_servers::table)
            .values(MembershipRow { user_id, server_id })
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(())
    }
}
