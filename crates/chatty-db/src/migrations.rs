use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            username      TEXT NOT NULL DEFAULT '',
            email         TEXT NOT NULL DEFAULT '',
            avatar        TEXT NOT NULL DEFAULT '',
            avatar_style  TEXT,
            bio           TEXT,
            is_bot        INTEGER NOT NULL DEFAULT 0,
            persona       TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Placeholders share the empty username until setup completes.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username
            ON users(username) WHERE username != '';

        -- Stored in both directions; written in pairs.
        CREATE TABLE IF NOT EXISTS friends (
            user_id     TEXT NOT NULL REFERENCES users(id),
            friend_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, friend_id)
        );

        -- One row is both sentRequests[from] and receivedRequests[to].
        CREATE TABLE IF NOT EXISTS friend_requests (
            from_id     TEXT NOT NULL REFERENCES users(id),
            to_id       TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (from_id, to_id)
        );

        CREATE INDEX IF NOT EXISTS idx_friend_requests_to
            ON friend_requests(to_id);

        CREATE TABLE IF NOT EXISTS liked_profiles (
            user_id     TEXT NOT NULL REFERENCES users(id),
            target_id   TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, target_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            channel_id      TEXT NOT NULL,
            sender_id       TEXT NOT NULL,
            receiver_id     TEXT NOT NULL,
            content         TEXT NOT NULL DEFAULT '',
            image           TEXT,
            voice_note      TEXT,
            timestamp       INTEGER NOT NULL,
            is_ephemeral    INTEGER NOT NULL DEFAULT 0,
            is_system       INTEGER NOT NULL DEFAULT 0,
            game_type       TEXT,
            status          TEXT,
            has_been_seen   INTEGER NOT NULL DEFAULT 0,
            stored_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, seq);

        CREATE TABLE IF NOT EXISTS posts (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            username    TEXT NOT NULL,
            content     TEXT NOT NULL DEFAULT '',
            image       TEXT,
            timestamp   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS post_likes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS chat_metadata (
            channel_id      TEXT NOT NULL,
            participant_id  TEXT NOT NULL,
            name            TEXT NOT NULL DEFAULT '',
            dob             TEXT NOT NULL DEFAULT '',
            time            TEXT NOT NULL DEFAULT '',
            place           TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (channel_id, participant_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
