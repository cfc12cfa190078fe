//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::history::{HistoryConfig, HistoryStore};
use crate::relay::RelayEngine;
use crate::upstream::UpstreamApi;
use crate::ws::SessionRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay engine driving WebSocket sessions.
    pub relay: Arc<RelayEngine>,
    /// Upstream client for one-shot HTTP endpoints.
    pub upstream: Arc<dyn UpstreamApi>,
    /// Directory served as static frontend assets, if any.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Create new application state with empty session stores.
    pub fn new(upstream: Arc<dyn UpstreamApi>, history: &HistoryConfig) -> Self {
        let relay = RelayEngine::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(HistoryStore::new(history)),
            upstream.clone(),
        );

        Self {
            relay: Arc::new(relay),
            upstream,
            static_dir: None,
        }
    }

    /// Serve static assets from `dir`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.relay.registry()
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        self.relay.history()
    }
}
