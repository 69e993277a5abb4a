pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary
// that builds the web server router.
pub use rest::{
    assistant_health_handler, chat_handler, delete_project_handler, get_project_handler,
    health_handler, load_template_handler, save_project_handler,
};
pub use state::AppState;
