use std::sync::Arc;
use std::time::Duration;

use chatty_db::Database;
use chatty_db::messages::delete_expired_ephemeral;
use chatty_types::events::StorePath;
use tracing::{info, warn};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Background task that deletes ephemeral messages older than `ttl`.
///
/// Runs every `ttl` (at least every few seconds) and publishes a change
/// for each channel that lost messages.
pub async fn run_ephemeral_sweeper(db: Arc<Database>, ttl: Duration) {
    let mut interval = tokio::time::interval(ttl.max(MIN_SWEEP_INTERVAL));

    loop {
        interval.tick().await;

        let db = db.clone();
        let result = tokio::task::spawn_blocking(move || sweep_expired(&db, ttl)).await;
        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweeper: expired ephemeral messages in {} channels", count);
                }
            }
            Ok(Err(e)) => warn!("Sweeper error: {}", e),
            Err(e) => warn!("Sweeper task failed: {}", e),
        }
    }
}

/// Returns how many channels were touched.
pub fn sweep_expired(db: &Database, ttl: Duration) -> anyhow::Result<usize> {
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let cutoff = chrono::Utc::now().timestamp_millis().saturating_sub(ttl_millis);

    db.update(|tx, changes| -> anyhow::Result<usize> {
        let channels = delete_expired_ephemeral(tx, cutoff)?;
        for channel in &channels {
            changes.touch(StorePath::Messages(channel.clone()));
        }
        Ok(channels.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatty_db::messages::append_message;
    use chatty_db::models::NewMessage;
    use chatty_types::ChannelId;

    #[test]
    fn only_ephemeral_messages_expire() {
        let db = Database::open_in_memory().unwrap();
        let channel = ChannelId::between("a", "b");
        for (content, is_ephemeral) in [("poof", true), ("stays", false)] {
            let msg = NewMessage {
                channel_id: channel.clone(),
                sender_id: "a".into(),
                receiver_id: "b".into(),
                content: content.into(),
                image: None,
                voice_note: None,
                timestamp: 0,
                is_ephemeral,
                is_system: false,
                game_type: None,
                status: None,
            };
            db.update(|tx, _| append_message(tx, &msg)).unwrap();
        }

        // Long ttl: nothing is old enough yet
        assert_eq!(sweep_expired(&db, Duration::from_secs(3600)).unwrap(), 0);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sweep_expired(&db, Duration::ZERO).unwrap(), 1);

        let left: Vec<_> = db.get_messages(&channel).unwrap().into_iter().map(|m| m.content).collect();
        assert_eq!(left, vec!["stays"]);
    }
}
