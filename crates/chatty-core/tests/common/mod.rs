#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chatty_core::{CompletionService, Engine, EngineConfig};
use chatty_db::Database;
use chatty_gateway::Dispatcher;
use chatty_types::ChannelId;
use chatty_types::events::{GatewayEvent, SnapshotValue, StorePath};
use chatty_types::models::Message;
use tokio::sync::broadcast;

/// Hands out canned answers in order and records every prompt.
#[derive(Default)]
pub struct ScriptedCompletion {
    answers: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(answers: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _model_hint: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.answers.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => bail!("script exhausted"),
        }
    }
}

pub struct Harness {
    pub engine: Engine,
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
}

pub fn harness(completion: Arc<dyn CompletionService>) -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new(db.clone());
    let engine = Engine::start(db.clone(), dispatcher.clone(), completion, EngineConfig::default());
    Harness { engine, db, dispatcher }
}

impl Harness {
    /// Authenticated user with a finished profile named `user_{id}`.
    pub async fn user(&self, id: &str) {
        let profiles = self.engine.profiles();
        profiles.ensure_user(id, &format!("{id}@test")).await.unwrap();
        profiles
            .setup_profile(id, &format!("user_{id}"), None, None)
            .await
            .unwrap();
    }

    pub async fn friends(&self, a: &str, b: &str) {
        self.engine.graph().send_friend_request(a, b).await.unwrap();
        self.engine.graph().accept_friend_request(b, a).await.unwrap();
    }

    pub async fn messages(&self, a: &str, b: &str) -> Vec<Message> {
        self.engine
            .stream()
            .history(&ChannelId::between(a, b))
            .await
            .unwrap()
    }

    /// Waits until the channel holds `count` messages.
    pub async fn wait_for_messages(&self, a: &str, b: &str, count: usize) -> Vec<Message> {
        let mut sub = self.dispatcher.watch(StorePath::Messages(ChannelId::between(a, b)));
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match sub.next().await {
                    Some(Ok(SnapshotValue::Messages(list))) if list.len() >= count => return list,
                    Some(_) => continue,
                    None => panic!("store closed"),
                }
            }
        })
        .await
        .expect("messages never arrived")
    }
}

/// Next event matching `pred`, skipping everything else.
pub async fn next_event(
    rx: &mut broadcast::Receiver<GatewayEvent>,
    pred: impl Fn(&GatewayEvent) -> bool,
) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never arrived")
}

pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}
