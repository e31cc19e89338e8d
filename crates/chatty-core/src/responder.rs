//! Automated replies and on-demand generation modes. Every completion call
//! is bounded by a timeout and degrades to an empty result on failure; the
//! user gets a notice instead of an error.

use std::sync::Arc;

use chatty_gateway::Dispatcher;
use chatty_types::ChannelId;
use chatty_types::api::Register;
use chatty_types::models::{GameStatus, GameType, Message, Persona, User};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::completion::CompletionService;
use crate::config::EngineConfig;
use crate::error::{Rejection, Result};
use crate::stream::{MessageStream, OutgoingMessage};

/// Messages of history fed to reply suggestions.
const SUGGEST_HISTORY: u32 = 5;
/// Messages of history fed to the relationship report.
const REPORT_HISTORY: u32 = 20;

const DEGRADED_NOTICE: &str = "The responder is unavailable right now, try again in a bit.";

/// Work the responder performs off the send path.
#[derive(Debug, Clone)]
pub enum ReplyJob {
    /// A human wrote to an automated participant.
    BotReply {
        channel: ChannelId,
        human_id: String,
        bot_id: String,
        persona: Persona,
        text: String,
    },
    /// `loser_id` failed a dare sent by `opponent_id`.
    Punishment {
        channel: ChannelId,
        loser_id: String,
        opponent_id: String,
    },
}

/// Sending half of the reply queue. Enqueueing never blocks.
#[derive(Clone)]
pub struct ReplyQueue(mpsc::UnboundedSender<ReplyJob>);

impl ReplyQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReplyJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn enqueue(&self, job: ReplyJob) {
        if let Err(e) = self.0.send(job) {
            warn!("Reply worker is gone, dropping {:?}", e.0);
        }
    }
}

/// Broadcasts `active: true` on creation and `active: false` when dropped,
/// whichever way the generation ends.
struct ActivityGuard {
    dispatcher: Dispatcher,
    channel: ChannelId,
}

impl ActivityGuard {
    fn start(dispatcher: &Dispatcher, channel: &ChannelId) -> Self {
        dispatcher.responder_activity(channel, true);
        Self {
            dispatcher: dispatcher.clone(),
            channel: channel.clone(),
        }
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.dispatcher.responder_activity(&self.channel, false);
    }
}

// -- Prompt templates --

pub fn bot_reply_prompt(persona: &Persona, text: &str) -> String {
    let framing = persona
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("{} ", p))
        .unwrap_or_default();
    format!(
        "You are @{}. {}Friend says: \"{}\". Reply in 3-8 words, Hinglish slang, Gen-Z vibe. 1 emoji.",
        persona.username, framing, text
    )
}

pub fn rephrase_prompt(draft: &str, register: Register) -> String {
    let register = register.as_str();
    format!(
        "Rewrite \"{draft}\" into 3 short Gen-Z {register} variations. Separated by |. Max 6 words each. Use {register} slang exclusively. Just the variations."
    )
}

pub fn translate_prompt(draft: &str) -> String {
    format!("Translate this text to natural, standard English: \"{}\". Just the translated text.", draft)
}

pub fn suggest_prompt(history: &[Message]) -> String {
    let history = history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
    format!(
        "Based on this chat history:\n{history}\nProvide 4 short, interesting reply suggestions to keep the conversation going. Use Hinglish. Separated by |. Max 5 words each. Avoid awkward silence!"
    )
}

pub fn persona_query_prompt(details_json: &str, query: &str, register: Register) -> String {
    format!(
        "Vedic Astrologer Persona. Target: {}. Query: \"{}\". 20 words max, mysterious {}.",
        details_json,
        query,
        register.as_str()
    )
}

pub const TRUTH_OR_DARE_PROMPT: &str = "Send one spicy Gen-Z Truth or Dare. Just the text.";
pub const PUNISHMENT_PROMPT: &str = "Give a funny, embarrassing punishment for failing a dare. Hinglish. Short.";

/// History labelled `A:` for the asker and `B:` for everyone else.
pub fn report_prompt(asker_id: &str, history: &[Message]) -> String {
    let history = history
        .iter()
        .map(|m| {
            let who = if m.sender_id == asker_id { "A" } else { "B" };
            format!("{}: {}", who, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Analyze: {history}\nCategorize relationship and Score (%). Hinglish. Format: TYPE | SCORE | ANALYSIS.")
}

pub fn reading_prompt(bio: Option<&str>) -> String {
    format!(
        "Based on this user's bio: \"{}\", generate a brief, mystical Vedic Astrology reading. Include their 'Moon Sign' characteristics, a 'Daily Remedy', and a 'Mantra'. Format it with emojis.",
        bio.filter(|b| !b.trim().is_empty()).unwrap_or("A seeker of truth and connection")
    )
}

// -- Output parsing --

/// `a | b | c` into trimmed, non-empty variants.
pub fn split_variants(text: &str) -> Vec<String> {
    text.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCard {
    pub kind: String,
    pub score: String,
    pub analysis: String,
}

/// `TYPE | SCORE | ANALYSIS`. Missing fields become `?`; extra pipes stay
/// in the analysis.
pub fn parse_report(text: &str) -> ReportCard {
    let mut fields = text.splitn(3, '|').map(str::trim);
    let mut field = || {
        fields
            .next()
            .filter(|f| !f.is_empty())
            .unwrap_or("?")
            .to_string()
    };
    ReportCard {
        kind: field(),
        score: field(),
        analysis: field(),
    }
}

impl ReportCard {
    pub fn render(&self) -> String {
        format!(
            "📊 REPORT CARD:\n\n❤️ Type: {}\n🔥 Score: {}\n📝 Analysis: {}",
            self.kind, self.score, self.analysis
        )
    }
}

#[derive(Clone)]
pub struct Responder {
    inner: Arc<ResponderInner>,
}

struct ResponderInner {
    stream: MessageStream,
    dispatcher: Dispatcher,
    completion: Arc<dyn CompletionService>,
    config: EngineConfig,
}

impl Responder {
    pub fn new(
        stream: MessageStream,
        dispatcher: Dispatcher,
        completion: Arc<dyn CompletionService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                stream,
                dispatcher,
                completion,
                config,
            }),
        }
    }

    /// Drains the reply queue. Each job runs on its own task, so two quick
    /// messages to a bot get two independent replies.
    pub fn spawn_worker(&self, mut jobs: mpsc::UnboundedReceiver<ReplyJob>) -> JoinHandle<()> {
        let responder = self.clone();
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                let responder = responder.clone();
                tokio::spawn(async move { responder.run(job).await });
            }
            info!("Reply queue closed, responder worker exiting");
        })
    }

    async fn run(&self, job: ReplyJob) {
        match job {
            ReplyJob::BotReply {
                channel,
                human_id,
                bot_id,
                persona,
                text,
            } => self.bot_reply(&channel, &human_id, &bot_id, &persona, &text).await,
            ReplyJob::Punishment {
                channel,
                loser_id,
                opponent_id,
            } => self.punishment(&channel, &loser_id, &opponent_id).await,
        }
    }

    async fn bot_reply(&self, channel: &ChannelId, human_id: &str, bot_id: &str, persona: &Persona, text: &str) {
        let _activity = ActivityGuard::start(&self.inner.dispatcher, channel);

        let Some(reply) = self.generate(human_id, &bot_reply_prompt(persona, text)).await else {
            return;
        };
        tokio::time::sleep(self.inner.config.reply_delay).await;

        match self.inner.stream.append_automated(bot_id, human_id, reply).await {
            Ok(message) => debug!("@{} replied in {} ({})", persona.username, channel, message.id),
            Err(e) => {
                error!("Failed to append reply from {}: {}", bot_id, e);
                self.inner.dispatcher.notify(human_id, DEGRADED_NOTICE);
            }
        }
    }

    async fn punishment(&self, channel: &ChannelId, loser_id: &str, opponent_id: &str) {
        let _activity = ActivityGuard::start(&self.inner.dispatcher, channel);

        let Some(text) = self.generate(loser_id, PUNISHMENT_PROMPT).await else {
            return;
        };
        let mut outgoing = OutgoingMessage::text(loser_id, opponent_id, format!("💀 PUNISHMENT: {}", text));
        outgoing.is_system = true;

        if let Err(e) = self.inner.stream.send(outgoing).await {
            warn!("Punishment for {} was not delivered: {}", loser_id, e);
            self.inner.dispatcher.notify(loser_id, DEGRADED_NOTICE);
        }
    }

    /// One bounded completion call. `None` on failure, timeout or empty
    /// output; failures also notify `user_id`.
    async fn generate(&self, user_id: &str, prompt: &str) -> Option<String> {
        let config = &self.inner.config;
        let call = self.inner.completion.complete(&config.model, prompt);

        match tokio::time::timeout(config.completion_timeout, call).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("Completion for {} came back empty", user_id);
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                warn!("Completion failed for {}: {}", user_id, e);
                self.inner.dispatcher.notify(user_id, DEGRADED_NOTICE);
                None
            }
            Err(_) => {
                warn!("Completion timed out for {} after {:?}", user_id, config.completion_timeout);
                self.inner.dispatcher.notify(user_id, DEGRADED_NOTICE);
                None
            }
        }
    }

    async fn guarded(&self, user_id: &str, peer_id: &str, prompt: &str) -> Option<String> {
        let channel = self.inner.stream.channel_for(user_id, peer_id);
        let _activity = ActivityGuard::start(&self.inner.dispatcher, &channel);
        self.generate(user_id, prompt).await
    }

    /// Short alternative phrasings of an unsent draft.
    pub async fn rephrase(&self, user_id: &str, peer_id: &str, draft: &str, register: Register) -> Result<Vec<String>> {
        if draft.trim().is_empty() {
            return Err(Rejection::EmptyPrompt.into());
        }
        let text = self.guarded(user_id, peer_id, &rephrase_prompt(draft, register)).await;
        Ok(text.map(|t| split_variants(&t)).unwrap_or_default())
    }

    pub async fn translate(&self, user_id: &str, peer_id: &str, draft: &str) -> Result<Option<String>> {
        if draft.trim().is_empty() {
            return Err(Rejection::EmptyPrompt.into());
        }
        Ok(self.guarded(user_id, peer_id, &translate_prompt(draft)).await)
    }

    /// Continuation ideas from the tail of the channel. Nothing to suggest
    /// for an empty channel.
    pub async fn suggest(&self, user_id: &str, peer_id: &str) -> Result<Vec<String>> {
        let channel = self.inner.stream.channel_for(user_id, peer_id);
        let history = self.inner.stream.recent(&channel, SUGGEST_HISTORY).await?;
        if history.is_empty() {
            return Ok(Vec::new());
        }
        let text = self.guarded(user_id, peer_id, &suggest_prompt(&history)).await;
        Ok(text.map(|t| split_variants(&t)).unwrap_or_default())
    }

    /// Themed answer about the counterpart, posted into the channel. `None`
    /// when the counterpart has no stored details or generation degraded.
    pub async fn persona_query(
        &self,
        user_id: &str,
        peer_id: &str,
        query: &str,
        register: Register,
    ) -> Result<Option<Message>> {
        if query.trim().is_empty() {
            return Err(Rejection::EmptyPrompt.into());
        }

        let channel = self.inner.stream.channel_for(user_id, peer_id);
        let metadata = self.inner.stream.get_persona_details(&channel).await?;
        let Some(details) = metadata.get(peer_id) else {
            debug!("No persona details for {} in {}", peer_id, channel);
            return Ok(None);
        };
        let details_json = serde_json::to_string(details).map_err(anyhow::Error::from)?;

        let Some(text) = self
            .guarded(user_id, peer_id, &persona_query_prompt(&details_json, query, register))
            .await
        else {
            return Ok(None);
        };

        let mut outgoing = OutgoingMessage::text(user_id, peer_id, format!("🔮 ASTRO: {}", text));
        outgoing.is_system = true;
        outgoing.game_type = Some(GameType::Astro);
        Ok(Some(self.inner.stream.send(outgoing).await?))
    }

    /// Posts a pending truth-or-dare challenge addressed to `peer_id`.
    pub async fn truth_or_dare(&self, user_id: &str, peer_id: &str) -> Result<Option<Message>> {
        let Some(text) = self.guarded(user_id, peer_id, TRUTH_OR_DARE_PROMPT).await else {
            return Ok(None);
        };

        let mut outgoing = OutgoingMessage::text(user_id, peer_id, format!("🎲 T&D: {}", text));
        outgoing.game_type = Some(GameType::TruthDare);
        outgoing.status = Some(GameStatus::Pending);
        Ok(Some(self.inner.stream.send(outgoing).await?))
    }

    pub async fn relationship_report(&self, user_id: &str, peer_id: &str) -> Result<Option<Message>> {
        let channel = self.inner.stream.channel_for(user_id, peer_id);
        let history = self.inner.stream.recent(&channel, REPORT_HISTORY).await?;

        let Some(text) = self.guarded(user_id, peer_id, &report_prompt(user_id, &history)).await else {
            return Ok(None);
        };

        let mut outgoing = OutgoingMessage::text(user_id, peer_id, parse_report(&text).render());
        outgoing.game_type = Some(GameType::Report);
        Ok(Some(self.inner.stream.send(outgoing).await?))
    }

    /// Profile reading from the user's bio. Never fails; a degraded call
    /// yields a fixed line.
    pub async fn reading(&self, user: &User) -> String {
        self.generate(&user.id, &reading_prompt(user.bio.as_deref()))
            .await
            .unwrap_or_else(|| "The stars are silent today.".to_string())
    }
}
