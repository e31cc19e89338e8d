use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use chatty_types::models::Post;
use rusqlite::Connection;

use crate::models::NewPost;
use crate::queries::OptionalExt;
use crate::{Database, push_key};

impl Database {
    /// Posts newest-first by sender timestamp, optionally for one author.
    pub fn get_posts(&self, user_id: Option<&str>) -> Result<Vec<Post>> {
        self.with_conn(|conn| query_posts(conn, user_id))
    }

    pub fn count_posts(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

pub fn insert_post(conn: &Connection, post: &NewPost) -> Result<Post> {
    let id = push_key();
    conn.execute(
        "INSERT INTO posts (id, user_id, username, content, image, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, post.user_id, post.username, post.content, post.image, post.timestamp],
    )?;

    Ok(Post {
        id,
        user_id: post.user_id.clone(),
        username: post.username.clone(),
        content: post.content.clone(),
        image: post.image.clone(),
        timestamp: post.timestamp,
        likes: BTreeSet::new(),
    })
}

pub fn post_exists(conn: &Connection, post_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Toggle a like: removes if present, inserts if not.
/// Returns true if the like is now present.
pub fn toggle_post_like(conn: &Connection, post_id: &str, user_id: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        (post_id, user_id),
    )?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
        (post_id, user_id),
    )?;
    Ok(true)
}

pub fn query_posts(conn: &Connection, user_id: Option<&str>) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, username, content, image, timestamp FROM posts
         WHERE ?1 IS NULL OR user_id = ?1
         ORDER BY timestamp DESC, seq DESC",
    )?;
    let mut posts = stmt
        .query_map([user_id], |row| {
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                content: row.get(3)?,
                image: row.get(4)?,
                timestamp: row.get(5)?,
                likes: BTreeSet::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if posts.is_empty() {
        return Ok(posts);
    }

    let mut likes: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT post_id, user_id FROM post_likes")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (post_id, liker) = row?;
        likes.entry(post_id).or_default().insert(liker);
    }

    for post in &mut posts {
        if let Some(likers) = likes.remove(&post.id) {
            post.likes = likers;
        }
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::insert_placeholder_user;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.update(|tx, _| {
            insert_placeholder_user(tx, "a", "", "")?;
            insert_placeholder_user(tx, "b", "", "")
        })
        .unwrap();
        db
    }

    fn post(user: &str, content: &str, timestamp: i64) -> NewPost {
        NewPost {
            user_id: user.into(),
            username: user.into(),
            content: content.into(),
            image: None,
            timestamp,
        }
    }

    #[test]
    fn newest_first_and_filtered() {
        let db = seeded();
        db.update(|tx, _| insert_post(tx, &post("a", "old", 1))).unwrap();
        db.update(|tx, _| insert_post(tx, &post("b", "new", 3))).unwrap();
        db.update(|tx, _| insert_post(tx, &post("a", "mid", 2))).unwrap();

        let all: Vec<_> = db.get_posts(None).unwrap().into_iter().map(|p| p.content).collect();
        assert_eq!(all, vec!["new", "mid", "old"]);

        let mine: Vec<_> = db.get_posts(Some("a")).unwrap().into_iter().map(|p| p.content).collect();
        assert_eq!(mine, vec!["mid", "old"]);
        assert_eq!(db.count_posts("a").unwrap(), 2);
    }

    #[test]
    fn like_toggles() {
        let db = seeded();
        let stored = db.update(|tx, _| insert_post(tx, &post("a", "hello", 1))).unwrap();

        assert!(db.update(|tx, _| toggle_post_like(tx, &stored.id, "b")).unwrap());
        assert!(db.get_posts(None).unwrap()[0].likes.contains("b"));
        assert!(!db.update(|tx, _| toggle_post_like(tx, &stored.id, "b")).unwrap());
        assert!(db.get_posts(None).unwrap()[0].likes.is_empty());
    }
}
