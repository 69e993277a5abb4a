//! crates/writing_project_core/src/manager.rs
//!
//! Orchestrates the life of one project document: load-on-init, assembly of
//! surface fragments, save with its concurrency guard, and reconciliation
//! of assistant-proposed fragments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collect::{apply_fragment, CollectorRegistry, ModuleCollector};
use crate::domain::{ChatMessage, ChatRole, IdeaLocation, ProjectDocument};
use crate::ports::{PortError, PortResult, ProjectStore, TemplateLoader, WritingAssistant};
use crate::reconcile::{normalize_document, reconcile};
use crate::sanitize::{sanitize, word_count};
use crate::store::{StateStore, StoreEvent};

/// Shown in chat when no assistant endpoint is configured.
pub const ASSISTANT_NOT_CONFIGURED_MESSAGE: &str =
    "The AI Writing Assistant service is not properly configured. \
     Please contact your administrator.";

/// Shown in chat when the assistant endpoint is configured but unreachable
/// or answers with something other than a usable reply.
pub const ASSISTANT_UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, I'm having trouble responding right now. \
     Please try again in a moment.";

struct SaveState {
    in_flight: bool,
    /// Latest assembled document waiting behind an in-flight save. A newer
    /// request replaces it rather than queueing a second write.
    pending: Option<ProjectDocument>,
    last_saved_at: Option<DateTime<Utc>>,
}

/// Owns the synchronization discipline for one (activity, user) document.
pub struct ProjectManager {
    activity_id: String,
    user_id: Uuid,
    /// Instructor-supplied instructions, copied into fresh documents.
    instructions: Option<String>,
    store: Arc<StateStore>,
    collectors: CollectorRegistry,
    persistence: Arc<dyn ProjectStore>,
    assistant: Arc<dyn WritingAssistant>,
    templates: Arc<dyn TemplateLoader>,
    /// Set once the initial load completes; gates saves so one is never
    /// assembled from a document that is mid-load.
    ready: AtomicBool,
    save_state: Mutex<SaveState>,
}

impl ProjectManager {
    pub fn new(
        activity_id: impl Into<String>,
        user_id: Uuid,
        instructions: Option<String>,
        persistence: Arc<dyn ProjectStore>,
        assistant: Arc<dyn WritingAssistant>,
        templates: Arc<dyn TemplateLoader>,
    ) -> Self {
        let instructions = instructions.filter(|s| !s.is_empty());
        Self {
            activity_id: activity_id.into(),
            user_id,
            store: Arc::new(StateStore::new(ProjectDocument::new(instructions.clone()))),
            instructions,
            collectors: CollectorRegistry::new(),
            persistence,
            assistant,
            templates,
            ready: AtomicBool::new(false),
            save_state: Mutex::new(SaveState {
                in_flight: false,
                pending: None,
                last_saved_at: None,
            }),
        }
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    pub fn register_module(&self, collector: Box<dyn ModuleCollector>) {
        self.collectors.register(collector);
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.save_lock().last_saved_at
    }

    fn save_lock(&self) -> std::sync::MutexGuard<'_, SaveState> {
        self.save_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the stored document, or creates a fresh one when nothing is
    /// stored or the persistence collaborator is unreachable. The store is
    /// never left empty; load failure degrades to an in-memory document.
    pub async fn load_project(&self) -> ProjectDocument {
        let document = match self
            .persistence
            .load(&self.activity_id, self.user_id)
            .await
        {
            Ok(Some(document)) => {
                debug!(activity = %self.activity_id, "loaded stored project");
                document
            }
            Ok(None) => {
                info!(activity = %self.activity_id, "no stored project, creating a new one");
                ProjectDocument::new(self.instructions.clone())
            }
            Err(e) => {
                warn!(activity = %self.activity_id, error = %e,
                    "failed to load project, starting from a fresh document");
                ProjectDocument::new(self.instructions.clone())
            }
        };
        self.store.commit(document.clone());
        self.ready.store(true, Ordering::SeqCst);
        self.store.emit(StoreEvent::Ready(document.clone()));
        document
    }

    /// The assembly step: takes the current snapshot as the base, merges
    /// every registered collector's fragment into it (shallow, at each
    /// top-level key's own object level), recomputes the derived word count
    /// and stamps `metadata.modified`.
    pub fn collect_all_data(&self) -> PortResult<ProjectDocument> {
        let base = self.store.get();
        let mut value = serde_json::to_value(&base)
            .map_err(|e| PortError::Unexpected(format!("failed to serialize document: {e}")))?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| PortError::Unexpected("document is not an object".to_string()))?;

        for (name, fragment) in self.collectors.collect_all() {
            debug!(module = %name, "merging collected fragment");
            apply_fragment(root, &fragment);
        }

        let content = root
            .get("write")
            .and_then(|w| w.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(write) = root.get_mut("write").and_then(Value::as_object_mut) {
            write.insert("wordCount".to_string(), json!(word_count(&content)));
        }
        if let Some(metadata) = root.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("modified".to_string(), json!(Utc::now()));
        }

        normalize_document(value)
    }

    /// Assembles and persists one complete snapshot.
    ///
    /// At most one save is in flight at a time. A request arriving while
    /// one is in flight replaces the pending payload and returns; the
    /// in-flight call starts a new write with the pending payload as soon
    /// as the current one completes. Every request therefore results in a
    /// write of at-least-as-fresh data, without concurrent writes.
    pub async fn save_project(&self) -> PortResult<()> {
        if !self.is_ready() {
            return Err(PortError::Unexpected(
                "save requested before initial load completed".to_string(),
            ));
        }

        let document = self.collect_all_data()?;
        self.store.apply(document.clone());

        {
            let mut state = self.save_lock();
            if state.in_flight {
                state.pending = Some(document);
                debug!(activity = %self.activity_id, "save already in flight, payload queued");
                return Ok(());
            }
            state.in_flight = true;
        }

        let mut next = Some(document);
        while let Some(document) = next.take() {
            match self
                .persistence
                .save(&self.activity_id, self.user_id, &document)
                .await
            {
                Ok(()) => {
                    let now = Utc::now();
                    {
                        let mut state = self.save_lock();
                        state.last_saved_at = Some(now);
                        next = state.pending.take();
                        if next.is_none() {
                            state.in_flight = false;
                        }
                    }
                    self.store.emit(StoreEvent::Saved(now));
                }
                Err(e) => {
                    {
                        let mut state = self.save_lock();
                        state.in_flight = false;
                        state.pending = None;
                    }
                    error!(activity = %self.activity_id, error = %e, "save failed");
                    self.store
                        .emit(StoreEvent::Error(format!("Saving the project failed: {e}")));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Silent partial updates. Surfaces push authoritative state at
    /// well-defined instants (template load, chat append), not per
    /// keystroke, so none of these notify.
    pub fn update_metadata(&self, f: impl FnOnce(&mut crate::domain::Metadata)) {
        let mut document = self.store.get();
        f(&mut document.metadata);
        self.store.apply(document);
    }

    pub fn update_plan(&self, f: impl FnOnce(&mut crate::domain::Plan)) {
        let mut document = self.store.get();
        f(&mut document.plan);
        self.store.apply(document);
    }

    pub fn update_write(&self, f: impl FnOnce(&mut crate::domain::WriteState)) {
        let mut document = self.store.get();
        f(&mut document.write);
        self.store.apply(document);
    }

    pub fn update_edit(&self, f: impl FnOnce(&mut crate::domain::EditState)) {
        let mut document = self.store.get();
        f(&mut document.edit);
        self.store.apply(document);
    }

    pub fn update_ui(&self, f: impl FnOnce(&mut crate::domain::UiState)) {
        let mut document = self.store.get();
        f(&mut document.ui);
        self.store.apply(document);
    }

    /// Appends a message with a fresh id and timestamp and notifies, so the
    /// chat surface reacts immediately. Assistant messages trigger a save;
    /// user messages ride along with the next save.
    pub async fn add_chat_message(
        &self,
        role: ChatRole,
        content: impl Into<String>,
    ) -> PortResult<ChatMessage> {
        let message = self.append_chat_message(role, content);
        if role == ChatRole::Assistant {
            self.save_project().await?;
        }
        Ok(message)
    }

    fn append_chat_message(&self, role: ChatRole, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(role, content);
        let mut document = self.store.get();
        document.chat_history.push(message.clone());
        self.store.commit(document);
        message
    }

    /// One full chat turn: append the user message, send the sanitized
    /// snapshot to the assistant, append its reply, reconcile any proposed
    /// fragment, and save.
    ///
    /// Assistant failure never rolls back the user's message; it surfaces
    /// as a canned assistant reply instead.
    pub async fn send_chat_message(&self, user_input: &str) -> PortResult<String> {
        if !self.is_ready() {
            return Err(PortError::Unexpected(
                "chat requested before initial load completed".to_string(),
            ));
        }

        self.append_chat_message(ChatRole::User, user_input);
        let snapshot = sanitize(&self.store.get());

        let (reply, fragment) = match self.assistant.chat(user_input, &snapshot).await {
            Ok(exchange) => (
                exchange
                    .reply
                    .unwrap_or_else(|| ASSISTANT_UNAVAILABLE_MESSAGE.to_string()),
                exchange.project,
            ),
            Err(PortError::NotConfigured(detail)) => {
                warn!(detail = %detail, "assistant endpoint not configured");
                (ASSISTANT_NOT_CONFIGURED_MESSAGE.to_string(), None)
            }
            Err(e) => {
                error!(error = %e, "assistant request failed");
                (ASSISTANT_UNAVAILABLE_MESSAGE.to_string(), None)
            }
        };

        // Append the reply before reconciling so the copy the assistant
        // echoes back inside its fragment dedups against it.
        self.append_chat_message(ChatRole::Assistant, reply.clone());

        if let Some(fragment) = fragment {
            if let Err(e) = self.merge_assistant_fragment(&fragment) {
                // Store untouched on a failed merge; the reply still stands.
                warn!(error = %e, "discarding unusable assistant fragment");
            }
        }

        if let Err(e) = self.save_project().await {
            warn!(error = %e, "autosave after assistant reply failed");
        }
        Ok(reply)
    }

    /// Reconciles an assistant-proposed partial document into local state.
    /// On any failure the store is left exactly as it was.
    pub fn merge_assistant_fragment(&self, fragment: &Value) -> PortResult<()> {
        let current = serde_json::to_value(self.store.get())
            .map_err(|e| PortError::Unexpected(format!("failed to serialize document: {e}")))?;
        let merged = reconcile(&current, fragment);
        let document = normalize_document(merged)?;
        self.store.commit(document);
        Ok(())
    }

    /// Seeds outline section identities from a template. Ideas referencing
    /// sections that no longer exist are reassigned to the brainstorm.
    pub async fn load_template(&self, template_id: &str) -> PortResult<()> {
        let template = self.templates.load(template_id).await?;
        let mut document = self.store.get();
        document.plan.template_id = Some(template.id);
        document.plan.template_display_name = Some(template.display_name);
        document.plan.outline = template.sections;

        let section_ids: Vec<String> =
            document.plan.outline.iter().map(|s| s.id.clone()).collect();
        for idea in &mut document.plan.ideas {
            if idea.location == IdeaLocation::Outline {
                let known = idea
                    .section_id
                    .as_deref()
                    .map(|sid| section_ids.iter().any(|s| s == sid))
                    .unwrap_or(false);
                if !known {
                    warn!(idea = %idea.id, "idea orphaned by template change, moving to brainstorm");
                    idea.location = IdeaLocation::Brainstorm;
                    idea.section_id = None;
                }
            }
        }
        self.store.apply(document);
        Ok(())
    }

    /// Advisory probe of the assistant service. Never blocks normal
    /// operation; any failure reads as unavailable.
    pub async fn assistant_available(&self) -> bool {
        self.assistant.health().await.unwrap_or(false)
    }
}
