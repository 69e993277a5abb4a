pub mod collect;
pub mod domain;
pub mod manager;
pub mod ports;
pub mod reconcile;
pub mod sanitize;
pub mod store;

pub use collect::{CollectorRegistry, DocumentFragment, ModuleCollector, StaticCollector};
pub use domain::{
    ChatMessage, ChatRole, EditState, Idea, IdeaLocation, Metadata, OutlineSection, Plan,
    ProjectDocument, Suggestion, Tab, UiState, WriteState,
};
pub use manager::ProjectManager;
pub use ports::{
    AssistantExchange, OutlineTemplate, PortError, PortResult, ProjectStore, TemplateLoader,
    WritingAssistant,
};
pub use store::{EventKind, StateStore, StoreEvent, SubscriptionHandle};
