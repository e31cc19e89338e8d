use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use chatty_types::ChannelId;
use chatty_types::models::{ChatMetadata, PersonaDetails, User};
use rusqlite::{Connection, Row};

use crate::Database;
use crate::models::{ProfileUpdate, Relation};

const USER_COLUMNS: &str = "id, username, email, avatar, avatar_style, bio, is_bot, persona";

impl Database {
    // -- Users --

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| load_user(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(load_users)
    }

    // -- Chat metadata --

    pub fn get_chat_metadata(&self, channel_id: &ChannelId) -> Result<ChatMetadata> {
        self.with_conn(|conn| load_chat_metadata(conn, channel_id))
    }
}

// -- Users --

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
        avatar_style: row.get(4)?,
        bio: row.get(5)?,
        is_bot: row.get(6)?,
        persona: row.get(7)?,
        ..Default::default()
    })
}

pub fn load_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let Some(mut user) = stmt.query_row([id], user_from_row).optional()? else {
        return Ok(None);
    };

    user.friends = id_set(conn, "SELECT friend_id FROM friends WHERE user_id = ?1", id)?;
    user.sent_requests = id_set(conn, "SELECT to_id FROM friend_requests WHERE from_id = ?1", id)?;
    user.received_requests = id_set(conn, "SELECT from_id FROM friend_requests WHERE to_id = ?1", id)?;
    user.liked_profiles = id_set(conn, "SELECT target_id FROM liked_profiles WHERE user_id = ?1", id)?;
    Ok(Some(user))
}

/// Every user with relationship sets filled, ordered by id.
pub fn load_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let mut users = stmt
        .query_map([], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // One pass per edge table instead of four queries per user
    let friends = edge_map(conn, "SELECT user_id, friend_id FROM friends")?;
    let sent = edge_map(conn, "SELECT from_id, to_id FROM friend_requests")?;
    let received = edge_map(conn, "SELECT to_id, from_id FROM friend_requests")?;
    let liked = edge_map(conn, "SELECT user_id, target_id FROM liked_profiles")?;

    for user in &mut users {
        user.friends = friends.get(&user.id).cloned().unwrap_or_default();
        user.sent_requests = sent.get(&user.id).cloned().unwrap_or_default();
        user.received_requests = received.get(&user.id).cloned().unwrap_or_default();
        user.liked_profiles = liked.get(&user.id).cloned().unwrap_or_default();
    }

    Ok(users)
}

fn id_set(conn: &Connection, sql: &str, id: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

fn edge_map(conn: &Connection, sql: &str) -> Result<HashMap<String, BTreeSet<String>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (owner, other) = row?;
        map.entry(owner).or_default().insert(other);
    }
    Ok(map)
}

/// Creates the placeholder record for a newly authenticated user.
/// Returns false if the user already existed.
pub fn insert_placeholder_user(conn: &Connection, id: &str, email: &str, avatar: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, email, avatar) VALUES (?1, ?2, ?3)",
        (id, email, avatar),
    )?;
    Ok(inserted > 0)
}

/// Inserts or refreshes an automated persona without touching its edges.
pub fn upsert_bot(conn: &Connection, bot: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, avatar, bio, is_bot, persona)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
         ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            email = excluded.email,
            avatar = excluded.avatar,
            bio = excluded.bio,
            is_bot = 1,
            persona = excluded.persona",
        rusqlite::params![bot.id, bot.username, bot.email, bot.avatar, bot.bio, bot.persona],
    )?;
    Ok(())
}

pub fn update_profile(conn: &Connection, id: &str, update: &ProfileUpdate) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET username = ?2, bio = ?3, avatar = ?4, avatar_style = ?5 WHERE id = ?1",
        rusqlite::params![id, update.username, update.bio, update.avatar, update.avatar_style],
    )?;
    Ok(updated > 0)
}

pub fn username_owner(conn: &Connection, username: &str) -> Result<Option<String>> {
    conn.query_row("SELECT id FROM users WHERE username = ?1", [username], |row| row.get(0))
        .optional()
}

// -- Relationships --

pub fn relation(conn: &Connection, a: &str, b: &str) -> Result<Relation> {
    let exists = |sql: &str| -> Result<bool> {
        let found: Option<i64> = conn.query_row(sql, [a, b], |row| row.get(0)).optional()?;
        Ok(found.is_some())
    };

    Ok(Relation {
        friends: exists("SELECT 1 FROM friends WHERE user_id = ?1 AND friend_id = ?2")?,
        outgoing: exists("SELECT 1 FROM friend_requests WHERE from_id = ?1 AND to_id = ?2")?,
        incoming: exists("SELECT 1 FROM friend_requests WHERE from_id = ?2 AND to_id = ?1")?,
    })
}

/// Returns true if the request was newly recorded.
pub fn insert_friend_request(conn: &Connection, from_id: &str, to_id: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO friend_requests (from_id, to_id) VALUES (?1, ?2)",
        (from_id, to_id),
    )?;
    Ok(inserted > 0)
}

/// Returns true if a pending request was removed.
pub fn delete_friend_request(conn: &Connection, from_id: &str, to_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM friend_requests WHERE from_id = ?1 AND to_id = ?2",
        (from_id, to_id),
    )?;
    Ok(deleted > 0)
}

/// Writes both friend edges. Returns true if either edge was new.
pub fn insert_friendship(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    let mut inserted = 0;
    for (owner, other) in [(a, b), (b, a)] {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?1, ?2)",
            (owner, other),
        )?;
    }
    Ok(inserted > 0)
}

/// Returns true if the like was newly recorded.
pub fn insert_like(conn: &Connection, user_id: &str, target_id: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO liked_profiles (user_id, target_id) VALUES (?1, ?2)",
        (user_id, target_id),
    )?;
    Ok(inserted > 0)
}

// -- Chat metadata --

/// Merge-writes one participant's persona details.
pub fn upsert_persona_details(
    conn: &Connection,
    channel_id: &ChannelId,
    participant_id: &str,
    details: &PersonaDetails,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_metadata (channel_id, participant_id, name, dob, time, place)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(channel_id, participant_id) DO UPDATE SET
            name = excluded.name,
            dob = excluded.dob,
            time = excluded.time,
            place = excluded.place",
        rusqlite::params![
            channel_id.as_str(),
            participant_id,
            details.name,
            details.dob,
            details.time,
            details.place
        ],
    )?;
    Ok(())
}

pub fn load_chat_metadata(conn: &Connection, channel_id: &ChannelId) -> Result<ChatMetadata> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, name, dob, time, place FROM chat_metadata WHERE channel_id = ?1",
    )?;
    let rows = stmt.query_map([channel_id.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            PersonaDetails {
                name: row.get(1)?,
                dob: row.get(2)?,
                time: row.get(3)?,
                place: row.get(4)?,
            },
        ))
    })?;

    let mut metadata = ChatMetadata::new();
    for row in rows {
        let (participant, details) = row?;
        metadata.insert(participant, details);
    }
    Ok(metadata)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(ids: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.update(|tx, _| {
            for id in ids {
                insert_placeholder_user(tx, id, "", "")?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
        db
    }

    #[test]
    fn request_row_fills_both_sets() {
        let db = db_with_users(&["a", "b"]);
        db.update(|tx, _| insert_friend_request(tx, "a", "b")).unwrap();

        let a = db.get_user("a").unwrap().unwrap();
        let b = db.get_user("b").unwrap().unwrap();
        assert!(a.sent_requests.contains("b"));
        assert!(b.received_requests.contains("a"));
        assert!(a.received_requests.is_empty());

        let rel = db.with_conn(|conn| relation(conn, "b", "a")).unwrap();
        assert_eq!(rel, Relation { friends: false, outgoing: false, incoming: true });
    }

    #[test]
    fn friendship_is_symmetric_and_idempotent() {
        let db = db_with_users(&["a", "b"]);
        assert!(db.update(|tx, _| insert_friendship(tx, "a", "b")).unwrap());
        assert!(!db.update(|tx, _| insert_friendship(tx, "b", "a")).unwrap());

        let users = db.list_users().unwrap();
        assert!(users[0].friends.contains("b"));
        assert!(users[1].friends.contains("a"));
    }

    #[test]
    fn placeholder_insert_is_idempotent() {
        let db = db_with_users(&["a"]);
        let again = db.update(|tx, _| insert_placeholder_user(tx, "a", "x@y", "")).unwrap();
        assert!(!again);
        assert_eq!(db.get_user("a").unwrap().unwrap().email, "");
    }

    #[test]
    fn failed_update_rolls_back() {
        let db = db_with_users(&["a", "b"]);
        let result: Result<()> = db.update(|tx, _| {
            insert_friend_request(tx, "a", "b")?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());
        assert!(db.get_user("a").unwrap().unwrap().sent_requests.is_empty());
    }

    #[test]
    fn persona_details_merge_per_participant() {
        let db = db_with_users(&["a", "b"]);
        let channel = ChannelId::between("a", "b");
        let details = PersonaDetails { name: "A".into(), dob: "2000-01-01".into(), time: "10:00".into(), place: "Pune".into() };
        db.update(|tx, _| upsert_persona_details(tx, &channel, "a", &details)).unwrap();
        let moved = PersonaDetails { place: "Delhi".into(), ..details.clone() };
        db.update(|tx, _| upsert_persona_details(tx, &channel, "a", &moved)).unwrap();

        let metadata = db.get_chat_metadata(&channel).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["a"].place, "Delhi");
    }
}
