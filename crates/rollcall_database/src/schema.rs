//! Diesel table definitions for the Rollcall store.

diesel::table! {
    users (id) {
        id -> BigInt,
        username -> Text,
    }
}

diesel::table! {
    servers (id) {
        id -> BigInt,
        name -> Text,
    }
}

diesel::table! {
    user_servers (user_id, server_id) {
        user_id -> BigInt,
        server_id -> BigInt,
    }
}

diesel::table! {
    checkpoints (channel_id) {
        channel_id -> BigInt,
        last_message_id -> BigInt,
    }
}

diesel::joinable!(user_servers -> users (user_id));
diesel::joinable!(user_servers -> servers (server_id));

diesel::allow_tables_to_appear_in_same_query!(users, servers, user_servers, checkpoints);
