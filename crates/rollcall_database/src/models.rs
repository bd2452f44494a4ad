//! Diesel models for the Rollcall store.

use diesel::prelude::*;

/// Database row for the users table.
///
/// A user is created on the first sighting anywhere; the id is the stable
/// platform snowflake, the username is refreshed on later sightings.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i64,
    pub username: String,
}

/// Insertable struct for the users table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub id: i64,
    pub username: &'a str,
}

/// Database row for the servers table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::servers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ServerRow {
    pub id: i64,
    pub name: String,
}

/// Insertable struct for the servers table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::servers)]
pub struct NewServer<'a> {
    pub id: i64,
    pub name: &'a str,
}

/// Database row for the user_servers membership table.
///
/// Existence-only edge with a composite primary key; carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Insertable, Selectable)]
#[diesel(table_name = crate::schema::user_servers)]
#[diesel(primary_key(user_id, server_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MembershipRow {
    pub user_id: i64,
    pub server_id: i64,
}

/// Database row for the checkpoints table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Insertable, Selectable)]
#[diesel(table_name = crate::schema::checkpoints)]
#[diesel(primary_key(channel_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CheckpointRow {
    pub channel_id: i64,
    pub last_message_id: i64,
}
