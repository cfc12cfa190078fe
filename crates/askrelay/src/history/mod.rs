//! Per-session message history.
//!
//! Each session keeps its most recent relay messages, independent of whether
//! a client is currently connected. Histories live for the lifetime of the
//! process.

use std::collections::VecDeque;
use std::time::Instant;

use askrelay_protocol::RelayMessage;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::debug;
use serde::{Deserialize, Serialize};

/// Maximum number of messages retained per session.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Maximum number of sessions retained before the least recently active one
/// is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// History retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages kept per session (1 to 50); older ones are dropped.
    pub max_messages: usize,
    /// Sessions kept in memory (0 = unbounded).
    pub max_sessions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug)]
struct SessionHistory {
    messages: VecDeque<RelayMessage>,
    last_active: Instant,
}

impl SessionHistory {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            last_active: Instant::now(),
        }
    }
}

/// Concurrent store of session histories keyed by session identifier.
///
/// Mutations of one session are serialized by the map's shard lock; sessions
/// in different shards never contend.
#[derive(Debug)]
pub struct HistoryStore {
    sessions: DashMap<String, SessionHistory>,
    max_messages: usize,
    max_sessions: usize,
}

impl HistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            max_messages: config.max_messages.clamp(1, DEFAULT_MAX_MESSAGES),
            max_sessions: config.max_sessions,
        }
    }

    /// Append a message, creating the session's history if needed.
    pub fn append(&self, session_id: &str, message: RelayMessage) {
        self.append_then(session_id, message, |_| ());
    }

    /// Append a message and run `then` before any other writer or reader of
    /// the same session can proceed.
    pub fn append_then<R>(
        &self,
        session_id: &str,
        message: RelayMessage,
        then: impl FnOnce(&RelayMessage) -> R,
    ) -> R {
        let (result, created) = {
            let mut created = false;
            let mut history = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| {
                    created = true;
                    SessionHistory::new()
                });

            let result = then(&message);
            history.messages.push_back(message);
            while history.messages.len() > self.max_messages {
                history.messages.pop_front();
            }
            history.last_active = Instant::now();

            (result, created)
        };

        if created {
            self.enforce_session_cap(session_id);
        }
        result
    }

    /// Snapshot of a session's history, oldest first.
    pub fn get(&self, session_id: &str) -> Vec<RelayMessage> {
        self.sessions
            .get(session_id)
            .map(|h| h.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Run `f` over a session's history while holding its lock, so no append
    /// to that session can interleave.
    pub fn with_history<R>(&self, session_id: &str, f: impl FnOnce(&[RelayMessage]) -> R) -> R {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let history = entry.get_mut();
                history.last_active = Instant::now();
                f(history.messages.make_contiguous())
            }
            Entry::Vacant(_vacant) => f(&[]),
        }
    }

    /// Number of messages stored for a session.
    pub fn len(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|h| h.messages.len())
            .unwrap_or(0)
    }

    /// Number of sessions with stored history.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn enforce_session_cap(&self, keep: &str) {
        if self.max_sessions == 0 {
            return;
        }

        while self.sessions.len() > self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_active)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(session_id) => {
                    self.sessions.remove(&session_id);
                    debug!("Evicted history for idle session {}", session_id);
                }
                None => break,
            }
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}
