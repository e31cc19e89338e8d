use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use chatty_db::{Database, StoreChange};
use chatty_types::ChannelId;
use chatty_types::events::{GatewayEvent, SnapshotValue, StorePath};

use crate::snapshot::read_snapshot;

/// Fans store changes out to live subscriptions and carries transient
/// events (responder activity, notices) to connected clients.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    db: Arc<Database>,

    /// Transient events; every connection receives every event and filters
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { db, broadcast_tx }),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.inner.db
    }

    /// Subscribe to transient gateway events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Surface a non-fatal notice to one user.
    pub fn notify(&self, user_id: &str, message: impl Into<String>) {
        self.broadcast(GatewayEvent::Notice {
            user_id: user_id.to_string(),
            message: message.into(),
        });
    }

    pub fn responder_activity(&self, channel_id: &ChannelId, active: bool) {
        self.broadcast(GatewayEvent::ResponderActivity {
            channel_id: channel_id.clone(),
            active,
        });
    }

    /// Live view of one subtree. The change feed is attached before the
    /// first read so no commit can fall between the two.
    pub fn watch(&self, path: StorePath) -> Subscription {
        Subscription {
            changes: self.inner.db.subscribe(),
            db: self.inner.db.clone(),
            path,
            primed: false,
        }
    }
}

/// Yields the full current value of a path: once immediately, then after
/// every committed change under it. Changes that pile up while a value is
/// being read are folded into the next read, which already contains them.
pub struct Subscription {
    path: StorePath,
    db: Arc<Database>,
    changes: broadcast::Receiver<StoreChange>,
    primed: bool,
}

impl Subscription {
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<Result<SnapshotValue>> {
        if !self.primed {
            self.primed = true;
            return Some(self.read().await);
        }

        loop {
            match self.changes.recv().await {
                Ok(change) if self.path.covers(&change.path) => {
                    debug!("{} changed at r{}", self.path, change.revision);
                    if !self.drain() {
                        return None;
                    }
                    return Some(self.read().await);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Subscription to {} lagged by {} changes", self.path, n);
                    return Some(self.read().await);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Discards queued changes. Returns false if the feed closed.
    fn drain(&mut self) -> bool {
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Closed) => return false,
            }
        }
    }

    async fn read(&self) -> Result<SnapshotValue> {
        let db = self.db.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_snapshot(&db, &path))
            .await
            .map_err(|e| anyhow!("snapshot task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatty_db::messages::append_message;
    use chatty_db::models::NewMessage;

    fn note(channel: &ChannelId, content: &str) -> NewMessage {
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

    fn contents(value: SnapshotValue) -> Vec<String> {
        match value {
            SnapshotValue::Messages(list) => list.into_iter().map(|m| m.content).collect(),
            other => panic!("unexpected snapshot {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_value_then_changes() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(db.clone());
        let channel = ChannelId::between("a", "b");

        let mut sub = dispatcher.watch(StorePath::Messages(channel.clone()));
        assert!(contents(sub.next().await.unwrap().unwrap()).is_empty());

        db.update(|tx, changes| {
            changes.touch(StorePath::Messages(channel.clone()));
            append_message(tx, &note(&channel, "hey"))
        })
        .unwrap();

        assert_eq!(contents(sub.next().await.unwrap().unwrap()), vec!["hey"]);
    }

    #[tokio::test]
    async fn unrelated_changes_are_ignored() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(db.clone());
        let ours = ChannelId::between("a", "b");
        let theirs = ChannelId::between("c", "d");

        let mut sub = dispatcher.watch(StorePath::Messages(ours.clone()));
        sub.next().await.unwrap().unwrap();

        db.update(|tx, changes| {
            changes.touch(StorePath::Messages(theirs.clone()));
            append_message(tx, &note(&theirs, "not for us"))
        })
        .unwrap();
        db.update(|tx, changes| {
            changes.touch(StorePath::Messages(ours.clone()));
            append_message(tx, &note(&ours, "for us"))
        })
        .unwrap();

        assert_eq!(contents(sub.next().await.unwrap().unwrap()), vec!["for us"]);
    }
}
