pub mod assistant;
pub mod db;
pub mod templates;

pub use assistant::HttpAssistantAdapter;
pub use db::PgProjectStore;
pub use templates::FileTemplateLoader;
