use std::sync::Arc;

use chatty_db::Database;
use chatty_db::queries::{
    delete_friend_request, insert_friend_request, insert_friendship, insert_like, load_user, relation,
};
use chatty_types::api::{ContactEntry, ContactRelation, PeopleEntry};
use chatty_types::events::StorePath;
use chatty_types::models::User;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::blocking;
use crate::error::{Rejection, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    /// Already friends; nothing changed.
    AlreadyFriends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    AlreadyLiked,
}

/// Hidden from `viewer`'s discovery stream.
pub fn excluded_from_discovery(viewer: &User, candidate_id: &str) -> bool {
    candidate_id == viewer.id
        || viewer.friends.contains(candidate_id)
        || viewer.liked_profiles.contains(candidate_id)
}

/// Hidden from `viewer`'s people listing.
pub fn excluded_from_people(viewer: &User, candidate_id: &str) -> bool {
    candidate_id == viewer.id
        || viewer.friends.contains(candidate_id)
        || viewer.received_requests.contains(candidate_id)
}

/// Owns friend-request and like transitions. Every transition is one store
/// update, so both sides of a pair are written or neither is.
#[derive(Clone)]
pub struct RelationshipGraph {
    db: Arc<Database>,
}

fn require_user(conn: &Connection, id: &str) -> Result<User> {
    load_user(conn, id)?.ok_or_else(|| Rejection::UnknownUser.into())
}

impl RelationshipGraph {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn send_friend_request(&self, from_id: &str, to_id: &str) -> Result<()> {
        if from_id == to_id {
            return Err(Rejection::SelfRelationship.into());
        }

        let db = self.db.clone();
        let (from_id, to_id) = (from_id.to_string(), to_id.to_string());
        blocking(move || {
            db.update(|tx, changes| -> Result<()> {
                require_user(tx, &from_id)?;
                require_user(tx, &to_id)?;

                let rel = relation(tx, &from_id, &to_id)?;
                if rel.friends {
                    return Err(Rejection::AlreadyFriends.into());
                }
                if rel.outgoing {
                    return Err(Rejection::RequestAlreadyPending.into());
                }
                if rel.incoming {
                    return Err(Rejection::ReverseRequestPending.into());
                }

                insert_friend_request(tx, &from_id, &to_id)?;
                changes.touch(StorePath::User(from_id.clone()));
                changes.touch(StorePath::User(to_id.clone()));
                info!("Friend request {} -> {}", from_id, to_id);
                Ok(())
            })
        })
        .await
    }

    /// `by_id` accepts the pending request from `from_id`. Pending edges in
    /// both directions are cleared together with inserting both friend edges.
    pub async fn accept_friend_request(&self, by_id: &str, from_id: &str) -> Result<AcceptOutcome> {
        if by_id == from_id {
            return Err(Rejection::SelfRelationship.into());
        }

        let db = self.db.clone();
        let (by_id, from_id) = (by_id.to_string(), from_id.to_string());
        blocking(move || {
            db.update(|tx, changes| -> Result<AcceptOutcome> {
                let rel = relation(tx, &by_id, &from_id)?;
                if rel.friends {
                    debug!("{} and {} are already friends", by_id, from_id);
                    return Ok(AcceptOutcome::AlreadyFriends);
                }
                if !rel.incoming {
                    return Err(Rejection::NoPendingRequest.into());
                }

                delete_friend_request(tx, &from_id, &by_id)?;
                delete_friend_request(tx, &by_id, &from_id)?;
                insert_friendship(tx, &by_id, &from_id)?;
                changes.touch(StorePath::User(by_id.clone()));
                changes.touch(StorePath::User(from_id.clone()));
                info!("{} accepted {}", by_id, from_id);
                Ok(AcceptOutcome::Accepted)
            })
        })
        .await
    }

    pub async fn decline_friend_request(&self, by_id: &str, from_id: &str) -> Result<()> {
        let db = self.db.clone();
        let (by_id, from_id) = (by_id.to_string(), from_id.to_string());
        blocking(move || {
            db.update(|tx, changes| -> Result<()> {
                if !delete_friend_request(tx, &from_id, &by_id)? {
                    return Err(Rejection::NoPendingRequest.into());
                }
                changes.touch(StorePath::User(by_id.clone()));
                changes.touch(StorePath::User(from_id.clone()));
                Ok(())
            })
        })
        .await
    }

    /// One-sided: a like never checks or creates a reciprocal edge.
    pub async fn like_profile(&self, by_id: &str, target_id: &str) -> Result<LikeOutcome> {
        if by_id == target_id {
            return Err(Rejection::SelfRelationship.into());
        }

        let db = self.db.clone();
        let (by_id, target_id) = (by_id.to_string(), target_id.to_string());
        blocking(move || {
            db.update(|tx, changes| -> Result<LikeOutcome> {
                require_user(tx, &by_id)?;
                require_user(tx, &target_id)?;

                if !insert_like(tx, &by_id, &target_id)? {
                    return Ok(LikeOutcome::AlreadyLiked);
                }
                changes.touch(StorePath::User(by_id.clone()));
                Ok(LikeOutcome::Liked)
            })
        })
        .await
    }

    /// Finished profiles not excluded for `viewer`, filtered by a
    /// case-insensitive username substring.
    pub async fn people(&self, viewer_id: &str, search: &str) -> Result<Vec<PeopleEntry>> {
        let (viewer, users) = self.snapshot(viewer_id).await?;
        let needle = search.trim().to_lowercase();

        Ok(users
            .into_iter()
            .filter(|u| u.is_profile_complete() && !excluded_from_people(&viewer, &u.id))
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .map(|user| PeopleEntry {
                request_sent: viewer.sent_requests.contains(&user.id),
                user,
            })
            .collect())
    }

    /// Chat contacts: friends plus one-sided matches.
    pub async fn contacts(&self, viewer_id: &str) -> Result<Vec<ContactEntry>> {
        let (viewer, users) = self.snapshot(viewer_id).await?;

        Ok(users
            .into_iter()
            .filter(|u| u.id != viewer.id)
            .filter_map(|user| {
                let relation = if viewer.is_friend(&user.id) {
                    ContactRelation::Friend
                } else if viewer.liked_profiles.contains(&user.id) {
                    ContactRelation::Match
                } else {
                    return None;
                };
                Some(ContactEntry { user, relation })
            })
            .collect())
    }

    /// Viewer record plus every user, read together.
    pub(crate) async fn snapshot(&self, viewer_id: &str) -> Result<(User, Vec<User>)> {
        let db = self.db.clone();
        let viewer_id = viewer_id.to_string();
        blocking(move || {
            let users = db.list_users()?;
            let viewer = users
                .iter()
                .find(|u| u.id == viewer_id)
                .cloned()
                .ok_or(Rejection::UnknownUser)?;
            Ok((viewer, users))
        })
        .await
    }
}
