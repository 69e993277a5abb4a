//! crates/writing_project_core/src/domain.rs
//!
//! Defines the canonical document model for a writing project.
//! These structs serialize to the camelCase JSON contract shared with the
//! persistence collaborator and the writing-assistant service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Current version of the serialized document layout.
pub const SCHEMA_VERSION: u32 = 1;

/// The canonical, serializable snapshot of one writing project.
///
/// Exactly one document exists per (activity, user). Surfaces hold fragments
/// of it locally and contribute them back at assembly time; this struct is
/// the single source of truth in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectDocument {
    pub metadata: Metadata,
    pub plan: Plan,
    pub write: WriteState,
    pub edit: EditState,
    /// Append-only ordered chat transcript.
    pub chat_history: Vec<ChatMessage>,
    /// Transient presentation state. Informative only, never a source of
    /// truth for plan/write/edit content.
    pub ui: UiState,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ProjectDocument {
    /// Builds a fresh, empty project: no ideas, no outline, empty content,
    /// empty transcript, timestamps set to now.
    pub fn new(instructions: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            metadata: Metadata {
                title: String::new(),
                description: String::new(),
                created: now,
                modified: now,
                schema_version: SCHEMA_VERSION,
                current_tab: Tab::Plan,
                instructions,
            },
            plan: Plan::default(),
            write: WriteState::default(),
            edit: EditState::default(),
            chat_history: Vec::new(),
            ui: UiState::default(),
        }
    }
}

/// Document-level metadata, including the instructor-supplied instructions
/// (a read-only copy taken at creation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub schema_version: u32,
    pub current_tab: Tab,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            title: String::new(),
            description: String::new(),
            created: now,
            modified: now,
            schema_version: SCHEMA_VERSION,
            current_tab: Tab::Plan,
            instructions: None,
        }
    }
}

/// The editing surface the user currently has open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Plan,
    Write,
    Edit,
}

impl Tab {
    /// The phase name the assistant service keys its prompts on.
    pub fn as_phase(&self) -> &'static str {
        match self {
            Tab::Plan => "plan_organize",
            Tab::Write => "write",
            Tab::Edit => "edit_revise",
        }
    }
}

/// The planning surface: brainstormed ideas and the template-defined outline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Plan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_display_name: Option<String>,
    pub ideas: Vec<Idea>,
    pub outline: Vec<OutlineSection>,
}

/// Where an idea bubble currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdeaLocation {
    #[default]
    Brainstorm,
    Outline,
}

/// A single brainstormed idea ("bubble").
///
/// `id` is generated client-side and immutable once assigned. `section_id`
/// is meaningful only when `location == Outline`, where it must reference an
/// existing outline section. `ai_generated` is set at creation and never
/// flips afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub location: IdeaLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default)]
    pub ai_generated: bool,
}

/// A template-defined slot that groups ideas into a structural unit.
///
/// Section identities are seeded once by the template loader; the
/// reconciliation engine never creates or destroys them, only the ideas
/// referencing them change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineSection {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// The drafting surface. `word_count` is derived from the plain-text
/// rendering of `content` at collection time and never trusted as stored
/// truth between saves.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteState {
    pub content: String,
    pub word_count: usize,
}

/// The revision surface: the content under edit plus assistant feedback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditState {
    pub content: String,
    pub suggestions: Vec<Suggestion>,
}

/// Opaque structured feedback attached to the edit surface. Not created by
/// this engine, only merged and passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suggestion(pub Value);

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry in the chat transcript.
///
/// For deduplication a message is identified by the (role, content,
/// timestamp) triple rather than `id`, because the assistant service may
/// echo history back without the client-generated ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message with a fresh id and the current timestamp.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Dedup identity: equal on (role, content, timestamp).
    pub fn matches(&self, other: &ChatMessage) -> bool {
        self.role == other.role
            && self.content == other.content
            && self.timestamp == other.timestamp
    }
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Free-form per-surface presentation state (scroll positions, collapsed
/// panels, ...). Round-tripped verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiState(pub Map<String, Value>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_defaults() {
        let doc = ProjectDocument::new(Some("Compare two poems.".to_string()));
        assert!(doc.plan.ideas.is_empty());
        assert!(doc.plan.outline.is_empty());
        assert_eq!(doc.write.content, "");
        assert!(doc.chat_history.is_empty());
        assert_eq!(doc.metadata.current_tab, Tab::Plan);
        assert_eq!(doc.metadata.schema_version, SCHEMA_VERSION);
        assert_eq!(
            doc.metadata.instructions.as_deref(),
            Some("Compare two poems.")
        );
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut doc = ProjectDocument::new(None);
        doc.plan.ideas.push(Idea {
            id: "idea-1".to_string(),
            content: "opening hook".to_string(),
            location: IdeaLocation::Brainstorm,
            section_id: None,
            ai_generated: false,
        });
        doc.chat_history
            .push(ChatMessage::new(ChatRole::User, "hello"));

        let json = serde_json::to_value(&doc).unwrap();
        let back: ProjectDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let doc = ProjectDocument::new(None);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("chatHistory").is_some());
        assert!(json["metadata"].get("currentTab").is_some());
        assert_eq!(json["metadata"]["currentTab"], "plan");
        assert!(json["write"].get("wordCount").is_some());
    }

    #[test]
    fn chat_message_without_id_gets_a_fresh_one() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": "Sounds good!",
            "timestamp": "2025-03-01T12:00:00Z",
        }))
        .unwrap();
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn tab_maps_to_assistant_phase() {
        assert_eq!(Tab::Plan.as_phase(), "plan_organize");
        assert_eq!(Tab::Write.as_phase(), "write");
        assert_eq!(Tab::Edit.as_phase(), "edit_revise");
    }
}
