use std::sync::Arc;

use chatty_db::Database;
use chatty_db::models::ProfileUpdate;
use chatty_db::queries::{insert_placeholder_user, load_user, update_profile, upsert_bot, username_owner};
use chatty_types::channel::CHANNEL_SEPARATOR;
use chatty_types::events::StorePath;
use chatty_types::models::User;
use tracing::info;

use crate::blocking;
use crate::error::{Rejection, Result};

pub const MIN_USERNAME_LEN: usize = 3;
pub const DEFAULT_AVATAR_STYLE: &str = "avataaars";

/// Lower-cases and replaces every whitespace character with `_`.
pub fn normalize_username(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

pub fn avatar_url(style: &str, seed: &str) -> String {
    format!("https://api.dicebear.com/7.x/{}/svg?seed={}", style, seed)
}

/// Built-in automated personas.
pub fn seed_personas() -> Vec<User> {
    [
        ("bot_1", "zoya_poet", "Zoya", "Living in verses and chai. ☕️ | Poetess | Dreamer"),
        ("bot_2", "aryan_tech", "Aryan", "Building the future one line of code at a time. 💻"),
        ("bot_3", "ishani_gamer", "Ishani", "Don't ask me to pause online games. 🎮 | Valorant fan"),
        ("bot_4", "kabir_fitness", "Kabir", "Gym is my therapy. 🏋️‍♂️ | Nutrition | Growth"),
        ("bot_5", "mira_art", "Mira", "Painting my own reality. 🎨 | Aesthetic seeker"),
    ]
    .into_iter()
    .map(|(id, username, name, bio)| User {
        id: id.into(),
        username: username.into(),
        email: format!("{}@social.bot", name.to_lowercase()),
        avatar: avatar_url(DEFAULT_AVATAR_STYLE, name),
        bio: Some(bio.into()),
        is_bot: true,
        persona: Some(format!("Your bio: {}.", bio)),
        ..Default::default()
    })
    .collect()
}

#[derive(Clone)]
pub struct Profiles {
    db: Arc<Database>,
}

impl Profiles {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Placeholder record on first authentication. Idempotent. Ids carrying
    /// the channel separator are refused; only personas may use it.
    pub async fn ensure_user(&self, id: &str, email: &str) -> Result<User> {
        if id.is_empty() || id.contains(CHANNEL_SEPARATOR) {
            return Err(Rejection::InvalidUserId { separator: CHANNEL_SEPARATOR }.into());
        }
        let db = self.db.clone();
        let id = id.to_string();
        let email = email.to_string();
        blocking(move || {
            db.update(|tx, changes| -> Result<User> {
                if insert_placeholder_user(tx, &id, &email, &avatar_url(DEFAULT_AVATAR_STYLE, &id))? {
                    info!("Created placeholder user {}", id);
                    changes.touch(StorePath::User(id.clone()));
                }
                load_user(tx, &id)?.ok_or_else(|| Rejection::UnknownUser.into())
            })
        })
        .await
    }

    pub async fn setup_profile(
        &self,
        id: &str,
        username: &str,
        bio: Option<String>,
        avatar_style: Option<String>,
    ) -> Result<User> {
        let username = normalize_username(username);
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(Rejection::UsernameTooShort { min: MIN_USERNAME_LEN }.into());
        }

        let style = avatar_style
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR_STYLE.to_string());
        let update = ProfileUpdate {
            username,
            bio: bio.filter(|b| !b.trim().is_empty()),
            avatar: avatar_url(&style, id),
            avatar_style: Some(style),
        };

        let db = self.db.clone();
        let id = id.to_string();
        blocking(move || {
            db.update(|tx, changes| -> Result<User> {
                if let Some(owner) = username_owner(tx, &update.username)? {
                    if owner != id {
                        return Err(Rejection::UsernameTaken.into());
                    }
                }
                if !update_profile(tx, &id, &update)? {
                    return Err(Rejection::UnknownUser.into());
                }
                changes.touch(StorePath::User(id.clone()));
                load_user(tx, &id)?.ok_or_else(|| Rejection::UnknownUser.into())
            })
        })
        .await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let db = self.db.clone();
        let id = id.to_string();
        blocking(move || Ok(db.get_user(&id)?)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let db = self.db.clone();
        blocking(move || Ok(db.list_users()?)).await
    }

    /// Upserts the built-in personas. Their relationship sets are left alone.
    pub async fn seed_bots(&self) -> Result<usize> {
        let db = self.db.clone();
        let bots = seed_personas();
        blocking(move || {
            db.update(|tx, changes| -> Result<usize> {
                for bot in &bots {
                    upsert_bot(tx, bot)?;
                    changes.touch(StorePath::User(bot.id.clone()));
                }
                Ok(bots.len())
            })
        })
        .await
    }
}
