//! Session store
//!
//! Host-side map from session id to its engine. Engines are created on first
//! use, evicted least-recently-used once the store is full, and expire after
//! sitting idle longer than the configured TTL.
//!
//! Each engine sits behind its own async mutex, so commands for one session
//! are processed one at a time while different sessions run concurrently.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::agent::orchestrator::Engine;
use crate::core::config::SessionConfig;
use crate::core::{Config, SessionId};
use crate::llm::ModelClient;
use crate::tools::events::{register_event_tools, EventsService};

/// Shared handle to a session's engine
pub type SharedEngine = Arc<tokio::sync::Mutex<Engine>>;

type EngineFactory = Box<dyn Fn(&SessionId) -> Engine + Send + Sync>;

struct Entry {
    engine: SharedEngine,
    last_used: Instant,
}

/// Owns one engine per live session
pub struct SessionStore {
    sessions: Mutex<LruCache<SessionId, Entry>>,
    ttl: Duration,
    factory: EngineFactory,
}

impl SessionStore {
    /// Create a store that builds new engines with `factory`
    pub fn new<F>(config: &SessionConfig, factory: F) -> Self
    where
        F: Fn(&SessionId) -> Engine + Send + Sync + 'static,
    {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl(),
            factory: Box::new(factory),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, LruCache<SessionId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Engine for `id`, created if absent or expired
    pub fn get_or_create(&self, id: &SessionId) -> SharedEngine {
        let now = Instant::now();
        let mut sessions = self.sessions();

        if let Some(entry) = sessions.get_mut(id) {
            if now.duration_since(entry.last_used) <= self.ttl {
                entry.last_used = now;
                return entry.engine.clone();
            }
            debug!(session = %id, "session expired, starting fresh");
        }

        let engine = Arc::new(tokio::sync::Mutex::new((self.factory)(id)));
        let entry = Entry {
            engine: engine.clone(),
            last_used: now,
        };
        if let Some((evicted, _)) = sessions.push(id.clone(), entry) {
            if &evicted != id {
                info!(session = %evicted, "evicted least recently used session");
            }
        }
        debug!(session = %id, "session created");
        engine
    }

    /// Engine for `id` if it is live; does not refresh its idle timer
    pub fn get(&self, id: &SessionId) -> Option<SharedEngine> {
        let now = Instant::now();
        self.sessions()
            .peek(id)
            .filter(|entry| now.duration_since(entry.last_used) <= self.ttl)
            .map(|entry| entry.engine.clone())
    }

    /// Drop a session, returning whether it existed
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions().pop(id).is_some()
    }

    /// Drop every session idle for longer than the TTL
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions();

        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_used) > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.pop(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "purged expired sessions");
        }
        expired.len()
    }

    /// Live session ids, most recently used first
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Factory for event-assistant engines: the configured system prompt plus the
/// event tools, all sessions sharing one model client and events service
pub fn event_assistant_factory(
    config: &Config,
    model: Arc<dyn ModelClient>,
    events: Arc<EventsService>,
) -> impl Fn(&SessionId) -> Engine + Send + Sync + 'static {
    let agent = config.agent.clone();
    move |id| {
        let mut engine = Engine::new(id.clone(), model.clone(), &agent);
        if let Some(ref prompt) = agent.system_prompt {
            engine.set_system_prompt(prompt.clone());
        }
        register_event_tools(engine.tools_mut(), events.clone());
        engine
    }
}
