//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: the collaborator adapters plus
//! the map of live per-(activity, user) project managers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;
use writing_project_core::manager::ProjectManager;
use writing_project_core::ports::{ProjectStore, TemplateLoader, WritingAssistant};

use crate::config::Config;

type SessionKey = (String, Uuid);

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ProjectStore>,
    pub assistant: Arc<dyn WritingAssistant>,
    pub templates: Arc<dyn TemplateLoader>,
    /// One manager per (activity, user), created and loaded on first touch.
    sessions: Mutex<HashMap<SessionKey, Arc<ProjectManager>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ProjectStore>,
        assistant: Arc<dyn WritingAssistant>,
        templates: Arc<dyn TemplateLoader>,
    ) -> Self {
        Self {
            config,
            store,
            assistant,
            templates,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manager for this (activity, user), creating it and
    /// running the initial load when it does not exist yet.
    ///
    /// `instructions` are only consulted when the session is created; an
    /// existing document keeps the copy it was created with.
    pub async fn manager(
        &self,
        activity_id: &str,
        user_id: Uuid,
        instructions: Option<String>,
    ) -> Arc<ProjectManager> {
        let key = (activity_id.to_string(), user_id);
        let mut sessions = self.sessions.lock().await;
        if let Some(manager) = sessions.get(&key) {
            return Arc::clone(manager);
        }

        let manager = Arc::new(ProjectManager::new(
            activity_id,
            user_id,
            instructions,
            Arc::clone(&self.store),
            Arc::clone(&self.assistant),
            Arc::clone(&self.templates),
        ));
        manager.load_project().await;
        sessions.insert(key, Arc::clone(&manager));
        manager
    }

    /// Drops the in-memory session, e.g. after the stored record was deleted.
    pub async fn drop_session(&self, activity_id: &str, user_id: Uuid) {
        let key = (activity_id.to_string(), user_id);
        self.sessions.lock().await.remove(&key);
    }
}
