//! services/api/src/adapters/templates.rs
//!
//! File-based implementation of the `TemplateLoader` port. Outline templates
//! live as JSON files under the configured templates directory, one file per
//! template id.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use writing_project_core::domain::OutlineSection;
use writing_project_core::ports::{OutlineTemplate, PortError, PortResult, TemplateLoader};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateFile {
    #[serde(default)]
    display_name: Option<String>,
    sections: Vec<OutlineSection>,
}

/// Loads outline templates from `<dir>/<template_id>.json`.
#[derive(Clone)]
pub struct FileTemplateLoader {
    dir: PathBuf,
}

impl FileTemplateLoader {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl TemplateLoader for FileTemplateLoader {
    async fn load(&self, template_id: &str) -> PortResult<OutlineTemplate> {
        // Template ids come from client requests; keep them inside the dir.
        if template_id.is_empty()
            || template_id.contains('/')
            || template_id.contains('\\')
            || template_id.contains("..")
        {
            return Err(PortError::NotFound(template_id.to_string()));
        }

        let path = self.dir.join(format!("{template_id}.json"));
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PortError::NotFound(format!("template {template_id} not found"))
            } else {
                PortError::Unexpected(e.to_string())
            }
        })?;

        let file: TemplateFile = serde_json::from_str(&raw).map_err(|e| {
            PortError::Unexpected(format!("template {template_id} is malformed: {e}"))
        })?;

        Ok(OutlineTemplate {
            id: template_id.to_string(),
            display_name: file
                .display_name
                .unwrap_or_else(|| template_id.to_string()),
            sections: file.sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn traversal_like_ids_are_rejected() {
        let loader = FileTemplateLoader::new(PathBuf::from("/tmp"));
        assert!(matches!(
            loader.load("../etc/passwd").await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(loader.load("").await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let loader = FileTemplateLoader::new(std::env::temp_dir());
        assert!(matches!(
            loader.load("does-not-exist").await,
            Err(PortError::NotFound(_))
        ));
    }
}
