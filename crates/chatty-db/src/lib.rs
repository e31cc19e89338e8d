pub mod messages;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod queries;

use anyhow::{Result, anyhow};
use chatty_types::events::StorePath;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the change feed. Subscribers that fall further behind only
/// lose intermediate notifications; they re-read full snapshots anyway.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// A committed write touched `path`. Revisions are assigned under the write
/// lock, so they follow commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub revision: u64,
    pub path: StorePath,
}

/// Paths touched by one atomic update.
#[derive(Debug, Default)]
pub struct Changes(Vec<StorePath>);

impl Changes {
    pub fn touch(&mut self, path: StorePath) {
        if !self.0.contains(&path) {
            self.0.push(path);
        }
    }
}

struct Inner {
    conn: Connection,
    revision: u64,
}

pub struct Database {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("Database opened at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            inner: Mutex::new(Inner { conn, revision: 0 }),
            changes,
        })
    }

    /// Read access. Nothing is published.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let inner = self.inner.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&inner.conn)
    }

    /// Atomic multi-path update: `f` runs inside one transaction and records
    /// the paths it touched. On success the transaction commits and one
    /// change per path is published before the lock is released; on error
    /// it rolls back and nothing is published.
    pub fn update<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>, &mut Changes) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| anyhow!("DB lock poisoned: {}", e))?;

        let mut changes = Changes::default();
        let tx = inner.conn.transaction().map_err(anyhow::Error::from)?;
        let out = f(&tx, &mut changes)?;
        tx.commit().map_err(anyhow::Error::from)?;

        for path in changes.0 {
            inner.revision += 1;
            debug!("store change r{} at {}", inner.revision, path);
            // No receivers is fine: nobody is watching yet.
            let _ = self.changes.send(StoreChange {
                revision: inner.revision,
                path,
            });
        }

        Ok(out)
    }

    /// Change feed of committed writes, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Store clock in epoch millis.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Push-style key for appended records. Time-ordered, but the row's `seq`
/// remains the ordering authority.
pub(crate) fn push_key() -> String {
    uuid::Uuid::now_v7().to_string()
}
