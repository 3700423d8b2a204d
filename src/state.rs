//! Shared application state.

use std::sync::Arc;

use tracing::info;

use crate::api::QuizApi;
use crate::auth::{AuthSession, AuthenticatedClient, TokenStore};
use crate::authoring::QuestionAuthoringFlow;
use crate::config::Config;
use crate::engine::TestEngine;
use crate::error::AppResult;
use crate::storage::{ClientStorage, SqliteStorage};

/// Everything a command needs: configuration, durable client state and the
/// session-aware API client. All clones share one token store.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite-backed client state.
    pub storage: SqliteStorage,
    /// Login, registration and refresh.
    pub session: AuthSession,
    /// Typed quiz API on top of the session.
    pub api: QuizApi,
}

impl AppState {
    /// Wire the session and API client onto `storage`
    pub fn new(config: Config, storage: SqliteStorage) -> AppResult<Self> {
        let shared: Arc<dyn ClientStorage> = Arc::new(storage.clone());
        let tokens = Arc::new(TokenStore::new(shared));
        let session = AuthSession::new(&config.api, config.request.clone(), tokens)?;
        let api = QuizApi::new(AuthenticatedClient::new(session.clone()));

        info!(base_url = %session.base_url(), "Quiz API client initialized");

        Ok(Self {
            config,
            storage,
            session,
            api,
        })
    }

    /// Fresh engine for one attempt at a test
    pub fn engine(&self) -> TestEngine {
        TestEngine::new(self.api.clone())
    }

    /// Authoring wizard persisting its draft to client storage
    pub fn authoring(&self) -> QuestionAuthoringFlow {
        QuestionAuthoringFlow::new(Arc::new(self.storage.clone()), self.api.clone())
    }
}
