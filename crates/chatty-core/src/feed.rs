use std::sync::Arc;

use chatty_db::Database;
use chatty_db::models::NewPost;
use chatty_db::posts::{insert_post, post_exists, toggle_post_like};
use chatty_db::queries::load_user;
use chatty_types::events::StorePath;
use chatty_types::models::Post;

use crate::blocking;
use crate::error::{Rejection, Result};

/// Public posts. Same append-and-subscribe shape as a channel, one shared list.
#[derive(Clone)]
pub struct Feed {
    db: Arc<Database>,
}

impl Feed {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, user_id: &str, content: String, image: Option<String>) -> Result<Post> {
        if content.trim().is_empty() && image.is_none() {
            return Err(Rejection::EmptyMessage.into());
        }

        let db = self.db.clone();
        let user_id = user_id.to_string();
        blocking(move || {
            db.update(|tx, changes| -> Result<Post> {
                let author = load_user(tx, &user_id)?.ok_or(Rejection::UnknownUser)?;
                let post = insert_post(
                    tx,
                    &NewPost {
                        user_id: author.id,
                        username: author.username,
                        content,
                        image,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                    },
                )?;
                changes.touch(StorePath::Posts);
                Ok(post)
            })
        })
        .await
    }

    /// Newest first, optionally for one author.
    pub async fn list_posts(&self, user_id: Option<&str>) -> Result<Vec<Post>> {
        let db = self.db.clone();
        let user_id = user_id.map(str::to_string);
        blocking(move || Ok(db.get_posts(user_id.as_deref())?)).await
    }

    /// Returns whether `user_id` now likes the post.
    pub async fn toggle_post_like(&self, post_id: &str, user_id: &str) -> Result<bool> {
        let db = self.db.clone();
        let (post_id, user_id) = (post_id.to_string(), user_id.to_string());
        blocking(move || {
            db.update(|tx, changes| -> Result<bool> {
                if !post_exists(tx, &post_id)? {
                    return Err(Rejection::UnknownPost.into());
                }
                let liked = toggle_post_like(tx, &post_id, &user_id)?;
                changes.touch(StorePath::Posts);
                Ok(liked)
            })
        })
        .await
    }

    pub async fn post_count(&self, user_id: &str) -> Result<usize> {
        let db = self.db.clone();
        let user_id = user_id.to_string();
        blocking(move || Ok(db.count_posts(&user_id)?)).await
    }
}
