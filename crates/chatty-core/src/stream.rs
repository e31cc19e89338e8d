use std::sync::Arc;

use chatty_db::Database;
use chatty_db::messages::{append_message, mark_seen, query_message, resolve_game_status};
use chatty_db::models::NewMessage;
use chatty_db::queries::{load_chat_metadata, load_user, relation, upsert_persona_details};
use chatty_types::ChannelId;
use chatty_types::events::StorePath;
use chatty_types::models::{ChatMetadata, GameStatus, GameType, Message, Participant, PersonaDetails};
use tracing::{debug, info};

use crate::blocking;
use crate::channels::ChannelRegistry;
use crate::error::{Rejection, Result};
use crate::responder::{ReplyJob, ReplyQueue};

/// Whitespace-delimited token count used by the non-friend length policy.
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// A message as submitted by a participant, before the store assigns its
/// key and sequence.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub image: Option<String>,
    pub voice_note: Option<String>,
    /// Sender clock. Defaults to the server clock.
    pub timestamp: Option<i64>,
    pub is_ephemeral: bool,
    pub is_system: bool,
    pub game_type: Option<GameType>,
    pub status: Option<GameStatus>,
}

impl OutgoingMessage {
    pub fn text(sender_id: &str, receiver_id: &str, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// No text, no attachment and no game payload.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
            && self.image.is_none()
            && self.voice_note.is_none()
            && self.game_type.is_none()
    }
}

/// Append-only message log per channel, plus the send-eligibility policy.
#[derive(Clone)]
pub struct MessageStream {
    db: Arc<Database>,
    channels: Arc<ChannelRegistry>,
    replies: ReplyQueue,
    word_limit: usize,
}

impl MessageStream {
    pub fn new(db: Arc<Database>, channels: Arc<ChannelRegistry>, replies: ReplyQueue, word_limit: usize) -> Self {
        Self {
            db,
            channels,
            replies,
            word_limit,
        }
    }

    pub fn channel_for(&self, a: &str, b: &str) -> ChannelId {
        self.channels.channel_for(a, b)
    }

    /// Validates, appends and, when the receiver is automated, queues a
    /// reply. The reply never blocks this append.
    pub async fn send(&self, outgoing: OutgoingMessage) -> Result<Message> {
        if outgoing.sender_id == outgoing.receiver_id {
            return Err(Rejection::SelfRelationship.into());
        }
        if outgoing.is_empty() {
            return Err(Rejection::EmptyMessage.into());
        }

        let channel = self.channel_for(&outgoing.sender_id, &outgoing.receiver_id);
        let limit = self.word_limit;
        let db = self.db.clone();
        let path = StorePath::Messages(channel.clone());
        let (message, receiver) = blocking(move || {
            db.update(|tx, changes| -> Result<(Message, Participant)> {
                let sender = load_user(tx, &outgoing.sender_id)?.ok_or(Rejection::UnknownUser)?;
                let receiver = load_user(tx, &outgoing.receiver_id)?.ok_or(Rejection::UnknownUser)?;

                if !relation(tx, &sender.id, &receiver.id)?.friends {
                    let words = word_count(&outgoing.content);
                    if words > limit {
                        return Err(Rejection::TooManyWords { words, limit }.into());
                    }
                }

                let message = append_message(tx, &new_message(channel, outgoing))?;
                changes.touch(path);
                Ok((message, receiver.participant()))
            })
        })
        .await?;

        debug!(
            "{} -> {} appended {:?} message {} (seq {})",
            message.sender_id, message.receiver_id, message.kind, message.id, message.seq
        );

        if let Participant::Automated(persona) = receiver {
            if !message.is_system {
                self.replies.enqueue(ReplyJob::BotReply {
                    channel: message.channel_id.clone(),
                    human_id: message.sender_id.clone(),
                    bot_id: message.receiver_id.clone(),
                    persona,
                    text: message.content.clone(),
                });
            }
        }

        Ok(message)
    }

    /// Appends a reply authored by an automated participant. Skips the
    /// length policy and never triggers another reply.
    pub async fn append_automated(&self, bot_id: &str, human_id: &str, content: String) -> Result<Message> {
        let channel = self.channel_for(bot_id, human_id);
        let outgoing = OutgoingMessage::text(bot_id, human_id, content);
        let db = self.db.clone();
        blocking(move || {
            db.update(|tx, changes| -> Result<Message> {
                let message = append_message(tx, &new_message(channel.clone(), outgoing))?;
                changes.touch(StorePath::Messages(channel));
                Ok(message)
            })
        })
        .await
    }

    /// Moves a game message from `pending` to a terminal status. Only the
    /// challenged participant may do so, and only once. A failed dare
    /// queues a punishment.
    pub async fn advance_game_status(
        &self,
        actor_id: &str,
        peer_id: &str,
        message_id: &str,
        status: GameStatus,
    ) -> Result<Message> {
        if !status.is_terminal() {
            return Err(Rejection::InvalidGameTransition.into());
        }

        let channel = self.channel_for(actor_id, peer_id);
        let db = self.db.clone();
        let actor = actor_id.to_string();
        let id = message_id.to_string();
        let path = StorePath::Messages(channel.clone());
        let tx_channel = channel.clone();
        let message = blocking(move || {
            db.update(|tx, changes| -> Result<Message> {
                let mut message = query_message(tx, &tx_channel, &id)?.ok_or(Rejection::UnknownMessage)?;
                let Some(current) = message.status.filter(|_| message.is_game()) else {
                    return Err(Rejection::NotAGame.into());
                };
                if message.receiver_id != actor {
                    return Err(Rejection::NotGameRecipient.into());
                }
                if !current.can_transition_to(status) {
                    return Err(Rejection::GameAlreadyResolved.into());
                }
                if !resolve_game_status(tx, &tx_channel, &id, status)? {
                    return Err(Rejection::GameAlreadyResolved.into());
                }

                changes.touch(path);
                message.status = Some(status);
                Ok(message)
            })
        })
        .await?;

        info!("{} resolved {} as {}", actor_id, message.id, status.as_str());

        if status == GameStatus::Failed {
            self.replies.enqueue(ReplyJob::Punishment {
                channel,
                loser_id: message.receiver_id.clone(),
                opponent_id: message.sender_id.clone(),
            });
        }
        Ok(message)
    }

    pub async fn history(&self, channel: &ChannelId) -> Result<Vec<Message>> {
        let db = self.db.clone();
        let channel = channel.clone();
        blocking(move || Ok(db.get_messages(&channel)?)).await
    }

    /// Last `limit` messages, oldest first.
    pub async fn recent(&self, channel: &ChannelId, limit: u32) -> Result<Vec<Message>> {
        let db = self.db.clone();
        let channel = channel.clone();
        blocking(move || Ok(db.get_recent_messages(&channel, limit)?)).await
    }

    pub async fn count(&self, channel: &ChannelId) -> Result<usize> {
        let db = self.db.clone();
        let channel = channel.clone();
        blocking(move || Ok(db.count_messages(&channel)?)).await
    }

    /// Flags everything `reader_id` has received from `peer_id` as seen.
    pub async fn mark_seen(&self, reader_id: &str, peer_id: &str) -> Result<usize> {
        let channel = self.channel_for(reader_id, peer_id);
        let db = self.db.clone();
        let reader = reader_id.to_string();
        blocking(move || {
            db.update(|tx, changes| -> Result<usize> {
                let updated = mark_seen(tx, &channel, &reader)?;
                if updated > 0 {
                    changes.touch(StorePath::Messages(channel.clone()));
                }
                Ok(updated)
            })
        })
        .await
    }

    /// Merge-writes `participant_id`'s persona details for the channel.
    pub async fn set_persona_details(
        &self,
        channel: &ChannelId,
        participant_id: &str,
        details: PersonaDetails,
    ) -> Result<ChatMetadata> {
        if !channel.involves(participant_id) {
            return Err(Rejection::UnknownUser.into());
        }

        let db = self.db.clone();
        let channel = channel.clone();
        let participant = participant_id.to_string();
        blocking(move || {
            db.update(|tx, changes| -> Result<ChatMetadata> {
                upsert_persona_details(tx, &channel, &participant, &details)?;
                changes.touch(StorePath::ChatMetadata(channel.clone()));
                Ok(load_chat_metadata(tx, &channel)?)
            })
        })
        .await
    }

    pub async fn get_persona_details(&self, channel: &ChannelId) -> Result<ChatMetadata> {
        let db = self.db.clone();
        let channel = channel.clone();
        blocking(move || Ok(db.get_chat_metadata(&channel)?)).await
    }
}

fn new_message(channel_id: ChannelId, outgoing: OutgoingMessage) -> NewMessage {
    NewMessage {
        channel_id,
        sender_id: outgoing.sender_id,
        receiver_id: outgoing.receiver_id,
        content: outgoing.content,
        image: outgoing.image,
        voice_note: outgoing.voice_note,
        timestamp: outgoing
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        is_ephemeral: outgoing.is_ephemeral,
        is_system: outgoing.is_system,
        game_type: outgoing.game_type,
        status: outgoing.status,
    }
}
