//! crates/writing_project_core/src/sanitize.rs
//!
//! Produces the text-only projection of a document sent to the assistant
//! service. One-way: the authoritative rich-text payloads in the store are
//! untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::domain::ProjectDocument;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reduces a rich-text payload to its plain-text rendering: markup removed,
/// common HTML entities decoded, whitespace collapsed.
pub fn strip_markup(content: &str) -> String {
    let without_tags = TAG_RE.replace_all(content, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    WHITESPACE_RE.replace_all(decoded.trim(), " ").to_string()
}

/// Word count of the plain-text rendering of a rich-text payload.
pub fn word_count(content: &str) -> usize {
    strip_markup(content).split_whitespace().count()
}

/// Builds the sanitized snapshot for an outbound assistant request.
///
/// Rich-text payloads in `write.content`, `edit.content`, idea contents and
/// outline titles/descriptions are reduced to plain text. The snapshot also
/// carries `currentPhase`, which the assistant keys its prompts on.
pub fn sanitize(document: &ProjectDocument) -> Value {
    let mut snapshot = document.clone();

    snapshot.write.content = strip_markup(&snapshot.write.content);
    snapshot.edit.content = strip_markup(&snapshot.edit.content);
    for idea in &mut snapshot.plan.ideas {
        idea.content = strip_markup(&idea.content);
    }
    for section in &mut snapshot.plan.outline {
        section.title = strip_markup(&section.title);
        section.description = strip_markup(&section.description);
    }

    let phase = snapshot.metadata.current_tab.as_phase();
    let mut value = serde_json::to_value(&snapshot).unwrap_or_else(|_| json!({}));
    if let Some(root) = value.as_object_mut() {
        root.insert("currentPhase".to_string(), json!(phase));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Idea, IdeaLocation, OutlineSection, Tab};

    #[test]
    fn strips_tags_and_decodes_entities() {
        assert_eq!(strip_markup("<b>hi</b>"), "hi");
        assert_eq!(
            strip_markup("<p>one&nbsp;two</p><p>three &amp; four</p>"),
            "one two three & four"
        );
        assert_eq!(strip_markup("  plain   text  "), "plain text");
    }

    #[test]
    fn word_count_ignores_markup() {
        assert_eq!(word_count("<p>three small words</p>"), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<br/>"), 0);
    }

    #[test]
    fn sanitized_snapshot_is_text_only_and_store_is_untouched() {
        let mut doc = ProjectDocument::new(None);
        doc.write.content = "<b>hi</b>".to_string();
        doc.plan.ideas.push(Idea {
            id: "a".to_string(),
            content: "<i>an idea</i>".to_string(),
            location: IdeaLocation::Brainstorm,
            section_id: None,
            ai_generated: false,
        });
        doc.plan.outline.push(OutlineSection {
            id: "intro".to_string(),
            title: "<h1>Introduction</h1>".to_string(),
            description: String::new(),
        });

        let snapshot = sanitize(&doc);
        assert_eq!(snapshot["write"]["content"], "hi");
        assert_eq!(snapshot["plan"]["ideas"][0]["content"], "an idea");
        assert_eq!(snapshot["plan"]["outline"][0]["title"], "Introduction");
        // Authoritative rich text is untouched.
        assert_eq!(doc.write.content, "<b>hi</b>");
    }

    #[test]
    fn snapshot_carries_the_current_phase() {
        let mut doc = ProjectDocument::new(None);
        doc.metadata.current_tab = Tab::Edit;
        let snapshot = sanitize(&doc);
        assert_eq!(snapshot["currentPhase"], "edit_revise");
    }
}
