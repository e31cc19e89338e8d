use anyhow::Result;
use chatty_types::ChannelId;
use chatty_types::models::{GameStatus, Message, MessageKind};
use rusqlite::{Connection, Row};
use tracing::warn;

use crate::models::NewMessage;
use crate::queries::OptionalExt;
use crate::{Database, now_millis, push_key};

const MESSAGE_COLUMNS: &str = "id, seq, channel_id, sender_id, receiver_id, content, image, voice_note, \
     timestamp, is_ephemeral, is_system, game_type, status, has_been_seen";

impl Database {
    pub fn get_messages(&self, channel_id: &ChannelId) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages(conn, channel_id))
    }

    pub fn get_message(&self, channel_id: &ChannelId, id: &str) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, channel_id, id))
    }

    pub fn get_recent_messages(&self, channel_id: &ChannelId, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_recent_messages(conn, channel_id, limit))
    }

    pub fn count_messages(&self, channel_id: &ChannelId) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                [channel_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let game_type = row.get::<_, Option<String>>(11)?.and_then(|raw| {
        raw.parse()
            .map_err(|e| warn!("Corrupt game_type on message '{}': {}", id, e))
            .ok()
    });
    let status = row.get::<_, Option<String>>(12)?.and_then(|raw| {
        raw.parse()
            .map_err(|e| warn!("Corrupt status on message '{}': {}", id, e))
            .ok()
    });

    let mut message = Message {
        id,
        seq: row.get(1)?,
        channel_id: ChannelId::from_raw(row.get::<_, String>(2)?),
        sender_id: row.get(3)?,
        receiver_id: row.get(4)?,
        content: row.get(5)?,
        image: row.get(6)?,
        voice_note: row.get(7)?,
        timestamp: row.get(8)?,
        is_ephemeral: row.get(9)?,
        is_system: row.get(10)?,
        game_type,
        status,
        has_been_seen: row.get(13)?,
        kind: MessageKind::Plain,
    };
    message.kind = message.classify();
    Ok(message)
}

/// Push-appends to the channel list. The store assigns the key and the
/// insertion sequence.
pub fn append_message(conn: &Connection, msg: &NewMessage) -> Result<Message> {
    let id = push_key();
    conn.execute(
        "INSERT INTO messages (id, channel_id, sender_id, receiver_id, content, image, voice_note,
                               timestamp, is_ephemeral, is_system, game_type, status, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            id,
            msg.channel_id.as_str(),
            msg.sender_id,
            msg.receiver_id,
            msg.content,
            msg.image,
            msg.voice_note,
            msg.timestamp,
            msg.is_ephemeral,
            msg.is_system,
            msg.game_type.map(|g| g.as_str()),
            msg.status.map(|s| s.as_str()),
            now_millis(),
        ],
    )?;

    let mut message = Message {
        id,
        seq: conn.last_insert_rowid(),
        channel_id: msg.channel_id.clone(),
        sender_id: msg.sender_id.clone(),
        receiver_id: msg.receiver_id.clone(),
        content: msg.content.clone(),
        image: msg.image.clone(),
        voice_note: msg.voice_note.clone(),
        timestamp: msg.timestamp,
        is_ephemeral: msg.is_ephemeral,
        is_system: msg.is_system,
        game_type: msg.game_type,
        status: msg.status,
        has_been_seen: false,
        kind: MessageKind::Plain,
    };
    message.kind = message.classify();
    Ok(message)
}

/// Whole channel in store-assigned order.
pub fn query_messages(conn: &Connection, channel_id: &ChannelId) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = ?1 ORDER BY seq ASC"
    ))?;
    let rows = stmt
        .query_map([channel_id.as_str()], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Last `limit` messages, still oldest first.
pub fn query_recent_messages(conn: &Connection, channel_id: &ChannelId, limit: u32) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = ?1 ORDER BY seq DESC LIMIT ?2"
    ))?;
    let mut rows = stmt
        .query_map(rusqlite::params![channel_id.as_str(), limit], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.reverse();
    Ok(rows)
}

pub fn query_message(conn: &Connection, channel_id: &ChannelId, id: &str) -> Result<Option<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = ?1 AND id = ?2"
    ))?;
    stmt.query_row([channel_id.as_str(), id], message_from_row).optional()
}

/// Moves a game message out of `pending`. The status guard is part of the
/// UPDATE, so of two racing transitions exactly one matches a row.
/// Returns false if the message was not pending.
pub fn resolve_game_status(
    conn: &Connection,
    channel_id: &ChannelId,
    id: &str,
    status: GameStatus,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE messages SET status = ?3 WHERE channel_id = ?1 AND id = ?2 AND status = 'pending'",
        (channel_id.as_str(), id, status.as_str()),
    )?;
    Ok(updated > 0)
}

/// Flags every unseen message addressed to `reader`. Returns how many changed.
pub fn mark_seen(conn: &Connection, channel_id: &ChannelId, reader_id: &str) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE messages SET has_been_seen = 1
         WHERE channel_id = ?1 AND receiver_id = ?2 AND has_been_seen = 0",
        (channel_id.as_str(), reader_id),
    )?;
    Ok(updated)
}

/// Deletes ephemeral messages stored before `cutoff` (epoch millis).
/// Returns the channels that lost messages.
pub fn delete_expired_ephemeral(conn: &Connection, cutoff: i64) -> Result<Vec<ChannelId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT channel_id FROM messages WHERE is_ephemeral = 1 AND stored_at < ?1",
    )?;
    let channels = stmt
        .query_map([cutoff], |row| row.get::<_, String>(0))?
        .map(|row| row.map(ChannelId::from_raw))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if !channels.is_empty() {
        conn.execute(
            "DELETE FROM messages WHERE is_ephemeral = 1 AND stored_at < ?1",
            [cutoff],
        )?;
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatty_types::models::GameType;

    fn new_message(channel: &ChannelId, content: &str) -> NewMessage {
        NewMessage {
            channel_id: channel.clone(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            content: content.into(),
            image: None,
            voice_note: None,
            timestamp: 0,
            is_ephemeral: false,
            is_system: false,
            game_type: None,
            status: None,
        }
    }

    #[test]
    fn order_follows_store_sequence_not_sender_clock() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");

        // Second sender's clock runs behind the first one's.
        let mut first = new_message(&channel, "first");
        first.timestamp = 2_000;
        let mut second = new_message(&channel, "second");
        second.timestamp = 1_000;

        db.update(|tx, _| append_message(tx, &first)).unwrap();
        db.update(|tx, _| append_message(tx, &second)).unwrap();

        let contents: Vec<_> = db.get_messages(&channel).unwrap().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn rows_carry_their_classification() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");
        let mut dare = new_message(&channel, "dare");
        dare.game_type = Some(GameType::TruthDare);
        dare.status = Some(GameStatus::Pending);
        let mut photo = new_message(&channel, "");
        photo.image = Some("data:image/png;base64,AAAA".into());

        assert_eq!(db.update(|tx, _| append_message(tx, &dare)).unwrap().kind, MessageKind::Game);
        db.update(|tx, _| append_message(tx, &photo)).unwrap();

        let kinds: Vec<_> = db.get_messages(&channel).unwrap().into_iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::Game, MessageKind::Media]);
    }

    #[test]
    fn status_resolves_once() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");
        let mut dare = new_message(&channel, "dare");
        dare.game_type = Some(GameType::TruthDare);
        dare.status = Some(GameStatus::Pending);
        let stored = db.update(|tx, _| append_message(tx, &dare)).unwrap();

        assert!(db.update(|tx, _| resolve_game_status(tx, &channel, &stored.id, GameStatus::Failed)).unwrap());
        assert!(!db.update(|tx, _| resolve_game_status(tx, &channel, &stored.id, GameStatus::Completed)).unwrap());

        let reloaded = db.get_message(&channel, &stored.id).unwrap().unwrap();
        assert_eq!(reloaded.status, Some(GameStatus::Failed));
    }

    #[test]
    fn recent_messages_keep_order() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");
        for i in 0..8 {
            db.update(|tx, _| append_message(tx, &new_message(&channel, &i.to_string()))).unwrap();
        }
        let recent: Vec<_> = db
            .get_recent_messages(&channel, 3)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(recent, vec!["5", "6", "7"]);
    }

    #[test]
    fn expired_ephemeral_messages_are_removed() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");
        let mut fleeting = new_message(&channel, "poof");
        fleeting.is_ephemeral = true;
        db.update(|tx, _| append_message(tx, &fleeting)).unwrap();
        db.update(|tx, _| append_message(tx, &new_message(&channel, "stays"))).unwrap();

        let touched = db.update(|tx, _| delete_expired_ephemeral(tx, now_millis() + 1)).unwrap();
        assert_eq!(touched, vec![channel.clone()]);
        assert_eq!(db.count_messages(&channel).unwrap(), 1);
    }
}
