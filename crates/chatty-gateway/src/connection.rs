use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use chatty_types::ChannelId;
use chatty_types::channel::CHANNEL_SEPARATOR;
use chatty_types::events::{GatewayCommand, GatewayEvent, StorePath};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may take to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Watchers = Arc<std::sync::Mutex<HashMap<StorePath, JoinHandle<()>>>>;

/// Handle a single WebSocket connection: `Identify`, `Ready`, then snapshots
/// for every subscribed path until the socket closes.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    let username = dispatcher
        .database()
        .get_user(&user_id)
        .ok()
        .flatten()
        .map(|u| u.username)
        .unwrap_or_default();

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id: user_id.clone(),
        username: username.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let mut broadcast_rx = dispatcher.subscribe();
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    // Channels this connection watches; responder activity is filtered on it.
    let watched_channels: Arc<std::sync::RwLock<HashSet<ChannelId>>> =
        Arc::new(std::sync::RwLock::new(HashSet::new()));
    let send_channels = watched_channels.clone();
    let watchers: Watchers = Arc::new(std::sync::Mutex::new(HashMap::new()));

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_user_id = user_id.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let deliver = match &event {
                        GatewayEvent::Notice { user_id, .. } => *user_id == send_user_id,
                        _ => match event.channel_id() {
                            Some(channel_id) => send_channels
                                .read()
                                .map(|subs| subs.contains(channel_id))
                                .unwrap_or(false),
                            None => true,
                        },
                    };
                    if deliver && send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                snapshot = snapshot_rx.recv() => {
                    let Some(event) = snapshot else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_user_id = user_id.clone();
    let recv_watchers = watchers.clone();
    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(
                        &recv_dispatcher,
                        &recv_user_id,
                        cmd,
                        &watched_channels,
                        &recv_watchers,
                        &snapshot_tx,
                    ),
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Ok(mut handles) = watchers.lock() {
        for (_, handle) in handles.drain() {
            handle.abort();
        }
    }
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<String> {
    use chatty_types::api::Claims;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

/// A user may watch the shared trees and only the channels they take part in.
/// Identities carrying the channel separator get no channel access.
fn may_watch(user_id: &str, path: &StorePath) -> bool {
    match path {
        StorePath::Messages(channel) | StorePath::ChatMetadata(channel) => {
            !user_id.contains(CHANNEL_SEPARATOR) && channel.involves(user_id)
        }
        StorePath::Users | StorePath::User(_) | StorePath::Posts => true,
    }
}

fn handle_command(
    dispatcher: &Dispatcher,
    user_id: &str,
    cmd: GatewayCommand,
    watched_channels: &Arc<std::sync::RwLock<HashSet<ChannelId>>>,
    watchers: &Watchers,
    snapshot_tx: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { paths } => {
            info!("{} subscribing to {} paths", user_id, paths.len());
            let Ok(mut handles) = watchers.lock() else { return };

            for path in paths {
                if !may_watch(user_id, &path) {
                    warn!("{} may not watch {}", user_id, path);
                    continue;
                }
                if handles.contains_key(&path) {
                    continue;
                }
                if let StorePath::Messages(channel) = &path {
                    if let Ok(mut subs) = watched_channels.write() {
                        subs.insert(channel.clone());
                    }
                }

                let mut subscription = dispatcher.watch(path.clone());
                let tx = snapshot_tx.clone();
                let handle = tokio::spawn(async move {
                    while let Some(result) = subscription.next().await {
                        match result {
                            Ok(value) => {
                                let event = GatewayEvent::Snapshot {
                                    path: subscription.path().clone(),
                                    value,
                                };
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Snapshot of {} failed: {}", subscription.path(), e),
                        }
                    }
                });
                handles.insert(path, handle);
            }
        }

        GatewayCommand::Unsubscribe { paths } => {
            let Ok(mut handles) = watchers.lock() else { return };
            for path in paths {
                if let Some(handle) = handles.remove(&path) {
                    handle.abort();
                }
                if let StorePath::Messages(channel) = &path {
                    if let Ok(mut subs) = watched_channels.write() {
                        subs.remove(channel);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_private_to_participants() {
        let channel = ChannelId::between("alice", "bob");
        assert!(may_watch("alice", &StorePath::Messages(channel.clone())));
        assert!(!may_watch("carol", &StorePath::Messages(channel.clone())));
        assert!(!may_watch("carol", &StorePath::ChatMetadata(channel)));
        assert!(may_watch("carol", &StorePath::Users));
        assert!(may_watch("carol", &StorePath::Posts));
    }

    #[test]
    fn persona_ids_do_not_open_other_channels() {
        let channel = ChannelId::between("bot_1", "zed");
        assert!(may_watch("zed", &StorePath::Messages(channel.clone())));
        assert!(!may_watch("bot", &StorePath::Messages(channel.clone())));
        assert!(!may_watch("bot", &StorePath::ChatMetadata(channel.clone())));
        assert!(!may_watch("bot_1", &StorePath::Messages(channel)));
    }
}
