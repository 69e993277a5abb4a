//! crates/writing_project_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's external
//! collaborators. These traits form the boundary of the hexagonal
//! architecture, keeping the synchronization core independent of the
//! concrete persistence backend and assistant transport.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{OutlineSection, ProjectDocument};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The collaborator exists in principle but no endpoint is configured.
    #[error("Service not configured: {0}")]
    NotConfigured(String),
    /// The collaborator answered, but not with the expected shape
    /// (non-2xx status, non-JSON body). Detail is for logging only.
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence collaborator: stores one serialized document per
/// (activity, user) key. Each save replaces the prior snapshot wholesale;
/// no version history is kept.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Loads the stored document, or `None` when the user has never saved
    /// this activity.
    async fn load(&self, activity_id: &str, user_id: Uuid)
        -> PortResult<Option<ProjectDocument>>;

    /// Persists one complete, self-consistent snapshot.
    async fn save(
        &self,
        activity_id: &str,
        user_id: Uuid,
        document: &ProjectDocument,
    ) -> PortResult<()>;

    async fn delete(&self, activity_id: &str, user_id: Uuid) -> PortResult<()>;
}

/// What the assistant returned for one chat turn.
#[derive(Debug, Clone)]
pub struct AssistantExchange {
    /// The conversational reply, if any.
    pub reply: Option<String>,
    /// An optional proposed partial document to be reconciled into local
    /// state. The assistant is authoritative for any field it returns.
    pub project: Option<Value>,
}

/// AI collaborator: given a sanitized snapshot and a user message, returns
/// a reply and optionally a proposed partial document.
#[async_trait]
pub trait WritingAssistant: Send + Sync {
    /// `sanitized_project` must be the text-only projection produced by
    /// [`crate::sanitize::sanitize`], never the raw rich-text document.
    async fn chat(&self, user_input: &str, sanitized_project: &Value)
        -> PortResult<AssistantExchange>;

    /// Advisory availability probe. Never blocks normal operation.
    async fn health(&self) -> PortResult<bool>;
}

/// An outline template as supplied by the template collaborator.
#[derive(Debug, Clone)]
pub struct OutlineTemplate {
    pub id: String,
    pub display_name: String,
    pub sections: Vec<OutlineSection>,
}

/// Template collaborator: seeds outline section identities, consumed once
/// at plan-surface initialization.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load(&self, template_id: &str) -> PortResult<OutlineTemplate>;
}
