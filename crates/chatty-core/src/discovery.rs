use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use chatty_types::api::DiscoveryResponse;
use chatty_types::models::User;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{LikeOutcome, RelationshipGraph, excluded_from_discovery};

fn is_candidate(viewer: &User, user: &User) -> bool {
    user.is_profile_complete() && !excluded_from_discovery(viewer, &user.id)
}

/// One viewer's pass over the candidates. The order is fixed when the
/// session is built; the cursor is re-checked against the viewer's current
/// exclusion sets on every read. Exhaustion is derived, never stored.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySession {
    candidates: Vec<String>,
    position: usize,
    /// Skipped during this session. Skips leave the graph untouched.
    skipped: HashSet<String>,
}

impl DiscoverySession {
    /// Candidates in store order, minus the exclusion rule and anything
    /// already skipped. Skips of users who are gone or excluded anyway are
    /// dropped.
    pub fn build(viewer: &User, users: &[User], skipped: HashSet<String>) -> Self {
        let skipped: HashSet<String> = users
            .iter()
            .filter(|u| skipped.contains(&u.id) && is_candidate(viewer, u))
            .map(|u| u.id.clone())
            .collect();
        let candidates = users
            .iter()
            .filter(|u| is_candidate(viewer, u) && !skipped.contains(&u.id))
            .map(|u| u.id.clone())
            .collect();
        Self {
            candidates,
            position: 0,
            skipped,
        }
    }

    /// Moves the cursor past candidates excluded since the session was
    /// built, or no longer present.
    pub fn settle(&mut self, viewer: &User, users: &[User]) {
        let live: HashSet<&str> = users
            .iter()
            .filter(|u| is_candidate(viewer, u))
            .map(|u| u.id.as_str())
            .collect();
        while let Some(id) = self.candidates.get(self.position) {
            if live.contains(id.as_str()) {
                break;
            }
            debug!("Discovery for {} passes over {}", viewer.id, id);
            self.position += 1;
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_id(&self) -> Option<&str> {
        self.candidates.get(self.position).map(String::as_str)
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.candidates.len()
    }

    pub fn skip(&mut self) {
        if let Some(id) = self.current_id() {
            let id = id.to_string();
            self.skipped.insert(id);
            self.position += 1;
        }
    }

    /// Called once the like for the current candidate is stored.
    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.position += 1;
        }
    }

    pub fn response(&self, users: &[User]) -> DiscoveryResponse {
        let candidate = self
            .current_id()
            .and_then(|id| users.iter().find(|u| u.id == id))
            .cloned();
        DiscoveryResponse {
            position: self.position(),
            candidate,
            exhausted: self.is_exhausted(),
        }
    }
}

/// Per-viewer discovery sessions over the relationship graph.
pub struct Discovery {
    graph: RelationshipGraph,
    sessions: Mutex<HashMap<String, DiscoverySession>>,
}

impl Discovery {
    pub fn new(graph: RelationshipGraph) -> Self {
        Self {
            graph,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Current candidate. An exhausted session is rebuilt first, so a new
    /// signup reopens the stream.
    pub async fn current(&self, viewer_id: &str) -> Result<DiscoveryResponse> {
        self.view(viewer_id, false).await
    }

    /// Re-derives candidates from the current exclusion sets and restarts
    /// the cursor. Session skips still apply.
    pub async fn refresh(&self, viewer_id: &str) -> Result<DiscoveryResponse> {
        self.view(viewer_id, true).await
    }

    /// Likes the current candidate and advances.
    pub async fn like(&self, viewer_id: &str) -> Result<DiscoveryResponse> {
        let current = self.current(viewer_id).await?;
        let Some(target) = current.candidate.map(|u| u.id) else {
            return self.current(viewer_id).await;
        };

        let outcome = self.graph.like_profile(viewer_id, &target).await?;
        if outcome == LikeOutcome::AlreadyLiked {
            debug!("{} already liked {}", viewer_id, target);
        }

        self.step(viewer_id, &target, DiscoverySession::advance)?;
        self.current(viewer_id).await
    }

    /// Passes on the current candidate without touching the graph.
    pub async fn skip(&self, viewer_id: &str) -> Result<DiscoveryResponse> {
        let current = self.current(viewer_id).await?;
        let Some(target) = current.candidate.map(|u| u.id) else {
            return self.current(viewer_id).await;
        };

        self.step(viewer_id, &target, DiscoverySession::skip)?;
        self.current(viewer_id).await
    }

    async fn view(&self, viewer_id: &str, rebuild: bool) -> Result<DiscoveryResponse> {
        let (viewer, users) = self.graph.snapshot(viewer_id).await?;

        let mut sessions = self.lock()?;
        let session = sessions.entry(viewer_id.to_string()).or_default();
        session.settle(&viewer, &users);

        if rebuild || session.is_exhausted() {
            let rebuilt = DiscoverySession::build(&viewer, &users, std::mem::take(&mut session.skipped));
            debug!("Discovery for {}: {} candidates", viewer_id, rebuilt.candidates.len());
            // An exhausted pass keeps its cursor until someone new shows up
            if rebuild || !rebuilt.is_exhausted() {
                *session = rebuilt;
            } else {
                session.skipped = rebuilt.skipped;
            }
        }
        Ok(session.response(&users))
    }

    /// Applies `f` if the cursor still points at `target`. Another request
    /// may have moved it meanwhile.
    fn step(&self, viewer_id: &str, target: &str, f: impl FnOnce(&mut DiscoverySession)) -> Result<()> {
        let mut sessions = self.lock()?;
        if let Some(session) = sessions.get_mut(viewer_id) {
            if session.current_id() == Some(target) {
                f(session);
            }
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, DiscoverySession>>> {
        self.sessions
            .lock()
            .map_err(|e| Error::Store(anyhow!("discovery sessions lock poisoned: {}", e)))
    }
}
