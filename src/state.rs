//! Application state management

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::document::SessionManager;
use crate::render::RenderCache;
use crate::services::DocumentServices;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionManager,
    services: Arc<dyn DocumentServices>,
    render_cache: RenderCache,
}

impl AppState {
    pub fn new(config: Config, services: Arc<dyn DocumentServices>) -> Self {
        let render_cache = RenderCache::new(config.viewer.render_cache_capacity);
        let sessions = SessionManager::with_idle_ttl(config.server.session_idle_ttl());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                services,
                render_cache,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the live document sessions
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Get the external services
    pub fn services(&self) -> &dyn DocumentServices {
        self.inner.services.as_ref()
    }

    /// Get the rendered frame cache
    pub fn render_cache(&self) -> &RenderCache {
        &self.inner.render_cache
    }

    /// Periodically drop idle sessions and their cached frames.
    pub fn start_session_cleanup(&self) -> JoinHandle<()> {
        let every = self.config().server.session_cleanup_interval();
        let state = self.clone();
        self.sessions()
            .clone()
            .start_cleanup_task(every, move |id| state.render_cache().invalidate_session(id))
    }
}
