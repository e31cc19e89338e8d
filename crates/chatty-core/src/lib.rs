pub mod channels;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod error;
pub mod feed;
pub mod graph;
pub mod profiles;
pub mod responder;
pub mod stream;
pub mod sweeper;

use std::sync::Arc;

use anyhow::anyhow;
use chatty_db::Database;
use chatty_gateway::Dispatcher;
use tracing::info;

pub use completion::{CompletionService, DisabledCompletion, HttpCompletion};
pub use config::EngineConfig;
pub use error::{Error, Rejection, Result};

use channels::ChannelRegistry;
use discovery::Discovery;
use feed::Feed;
use graph::RelationshipGraph;
use profiles::Profiles;
use responder::{ReplyQueue, Responder};
use stream::MessageStream;

/// Runs blocking store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Store(anyhow!("blocking task failed: {}", e)))?
}

/// The wired engine. Cheap to clone; every component shares one store and
/// one dispatcher.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    profiles: Profiles,
    graph: RelationshipGraph,
    stream: MessageStream,
    responder: Responder,
    discovery: Discovery,
    feed: Feed,
    dispatcher: Dispatcher,
}

impl Engine {
    /// Wires the components and spawns the reply worker, plus the ephemeral
    /// sweeper when a ttl is configured. Must be called inside a runtime.
    pub fn start(
        db: Arc<Database>,
        dispatcher: Dispatcher,
        completion: Arc<dyn CompletionService>,
        config: EngineConfig,
    ) -> Self {
        let channels = Arc::new(ChannelRegistry::new());
        let (replies, jobs) = ReplyQueue::channel();

        let graph = RelationshipGraph::new(db.clone());
        let stream = MessageStream::new(db.clone(), channels, replies, config.non_friend_word_limit);
        let responder = Responder::new(stream.clone(), dispatcher.clone(), completion, config.clone());
        responder.spawn_worker(jobs);

        if !config.ephemeral_ttl.is_zero() {
            info!("Ephemeral messages expire after {:?}", config.ephemeral_ttl);
            tokio::spawn(sweeper::run_ephemeral_sweeper(db.clone(), config.ephemeral_ttl));
        }

        Self {
            inner: Arc::new(EngineInner {
                profiles: Profiles::new(db.clone()),
                discovery: Discovery::new(graph.clone()),
                feed: Feed::new(db),
                graph,
                stream,
                responder,
                dispatcher,
            }),
        }
    }

    pub fn profiles(&self) -> &Profiles {
        &self.inner.profiles
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.inner.graph
    }

    pub fn stream(&self) -> &MessageStream {
        &self.inner.stream
    }

    pub fn responder(&self) -> &Responder {
        &self.inner.responder
    }

    pub fn discovery(&self) -> &Discovery {
        &self.inner.discovery
    }

    pub fn feed(&self) -> &Feed {
        &self.inner.feed
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}
