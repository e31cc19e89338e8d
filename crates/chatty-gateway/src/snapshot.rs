use anyhow::Result;
use chatty_db::Database;
use chatty_db::{messages, posts, queries};
use chatty_types::events::{SnapshotValue, StorePath};

/// Reads the full current value under `path`.
pub fn read_snapshot(db: &Database, path: &StorePath) -> Result<SnapshotValue> {
    db.with_conn(|conn| {
        let value = match path {
            StorePath::Users => SnapshotValue::Users(queries::load_users(conn)?),
            StorePath::User(id) => SnapshotValue::User(queries::load_user(conn, id)?),
            StorePath::Messages(channel) => SnapshotValue::Messages(messages::query_messages(conn, channel)?),
            StorePath::Posts => SnapshotValue::Posts(posts::query_posts(conn, None)?),
            StorePath::ChatMetadata(channel) => {
                SnapshotValue::ChatMetadata(queries::load_chat_metadata(conn, channel)?)
            }
        };
        Ok(value)
    })
}
