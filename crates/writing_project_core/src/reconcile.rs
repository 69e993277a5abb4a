//! crates/writing_project_core/src/reconcile.rs
//!
//! Merges an externally-proposed partial document into the current one.
//!
//! Per-field policy: `chatHistory` accumulates (candidates are appended only
//! when no existing message matches on role/content/timestamp), nested
//! objects merge recursively, and every other value (arrays included) is
//! replaced wholesale by the incoming side. The assistant is authoritative
//! for any field it chooses to return, except chat log accumulation.

use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::ProjectDocument;
use crate::ports::{PortError, PortResult};

/// Combines the current serialized document with an incoming partial one,
/// returning a new value. Neither input is mutated; both may still be
/// referenced elsewhere.
pub fn reconcile(current: &Value, incoming: &Value) -> Value {
    let (Some(cur), Some(inc)) = (current.as_object(), incoming.as_object()) else {
        return incoming.clone();
    };
    let mut out = cur.clone();
    for (key, inc_value) in inc {
        let next = match (key.as_str(), out.get(key), inc_value) {
            ("chatHistory", Some(Value::Array(existing)), Value::Array(candidates)) => {
                merge_chat_history(existing, candidates)
            }
            (_, Some(cur_value), _) => merge_value(cur_value, inc_value),
            (_, None, _) => inc_value.clone(),
        };
        out.insert(key.clone(), next);
    }
    Value::Object(out)
}

/// Recursive merge for everything below the top level: objects merge key by
/// key, any other incoming value wins outright.
fn merge_value(current: &Value, incoming: &Value) -> Value {
    match (current, incoming) {
        (Value::Object(cur), Value::Object(inc)) => {
            let mut out = cur.clone();
            for (key, inc_value) in inc {
                let next = match out.get(key) {
                    Some(cur_value) => merge_value(cur_value, inc_value),
                    None => inc_value.clone(),
                };
                out.insert(key.clone(), next);
            }
            Value::Object(out)
        }
        _ => incoming.clone(),
    }
}

/// Treats the incoming array as candidate additions: a candidate is appended
/// only when no existing message matches it. Order of surviving messages is
/// preserved; new ones go at the end.
///
/// A candidate carrying no timestamp (the assistant appends messages without
/// one) matches on (role, content) alone; otherwise the full
/// (role, content, timestamp) triple applies.
fn merge_chat_history(existing: &[Value], candidates: &[Value]) -> Value {
    let mut out = existing.to_vec();
    for candidate in candidates {
        let duplicate = out.iter().any(|message| same_message(message, candidate));
        if !duplicate {
            out.push(candidate.clone());
        }
    }
    Value::Array(out)
}

fn same_message(existing: &Value, candidate: &Value) -> bool {
    if existing.get("role") != candidate.get("role")
        || existing.get("content") != candidate.get("content")
    {
        return false;
    }
    match candidate.get("timestamp") {
        None | Some(Value::Null) => true,
        ts => existing.get("timestamp") == ts,
    }
}

/// Restores a serialized document into the typed model, preferring partial
/// restoration over hard failure:
///
/// - an idea missing its id or content is skipped with a warning;
/// - duplicate idea ids keep the first occurrence;
/// - an idea with an unknown location falls back to the brainstorm;
/// - an outline-located idea whose section no longer exists is reassigned
///   to the brainstorm (orphan recovery);
/// - a chat entry without a valid role or content is skipped;
/// - an unknown `metadata.currentTab` falls back to the plan tab;
/// - an unparseable timestamp is dropped and re-defaulted.
///
/// A document that still fails to deserialize is a hard error; the caller
/// must not touch the store in that case.
pub fn normalize_document(mut value: Value) -> PortResult<ProjectDocument> {
    if let Some(root) = value.as_object_mut() {
        normalize_metadata(root);
        normalize_plan(root);
        normalize_chat(root);
    }
    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("malformed project document: {e}")))
}

fn normalize_metadata(root: &mut Map<String, Value>) {
    let Some(metadata) = root.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };

    let tab_known = matches!(
        metadata.get("currentTab").and_then(Value::as_str),
        Some("plan") | Some("write") | Some("edit")
    );
    if metadata.contains_key("currentTab") && !tab_known {
        warn!("unknown currentTab in stored document, falling back to plan");
        metadata.insert("currentTab".to_string(), Value::String("plan".to_string()));
    }

    // Missing fields re-default at deserialization; a present-but-broken
    // timestamp must not reject the whole document.
    for field in ["created", "modified"] {
        if metadata.get(field).is_some_and(|ts| !is_valid_timestamp(ts)) {
            warn!(field, "dropping unparseable metadata timestamp during restoration");
            metadata.remove(field);
        }
    }
}

fn is_valid_timestamp(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
        .unwrap_or(false)
}

fn normalize_plan(root: &mut Map<String, Value>) {
    let Some(plan) = root.get_mut("plan").and_then(Value::as_object_mut) else {
        return;
    };

    let section_ids: Vec<String> = plan
        .get("outline")
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .filter_map(|s| s.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(ideas) = plan.get_mut("ideas").and_then(Value::as_array_mut) else {
        return;
    };

    let mut seen_ids: Vec<String> = Vec::new();
    let mut kept: Vec<Value> = Vec::new();
    for mut idea in ideas.drain(..) {
        let id = idea
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let has_content = matches!(idea.get("content"), Some(Value::String(_)));
        let Some(id) = id else {
            warn!("skipping idea without an id during restoration");
            continue;
        };
        if !has_content {
            warn!(idea = %id, "skipping idea without content during restoration");
            continue;
        }
        if seen_ids.contains(&id) {
            warn!(idea = %id, "skipping idea with duplicate id during restoration");
            continue;
        }

        let Some(fields) = idea.as_object_mut() else {
            continue;
        };
        let location_known = matches!(
            fields.get("location").and_then(Value::as_str),
            Some("brainstorm") | Some("outline")
        );
        if !location_known && fields.contains_key("location") {
            warn!(idea = %id, "idea has unknown location, moving to brainstorm");
        }
        let in_outline =
            fields.get("location").and_then(Value::as_str) == Some("outline");
        let section_exists = fields
            .get("sectionId")
            .and_then(Value::as_str)
            .map(|sid| section_ids.iter().any(|s| s == sid))
            .unwrap_or(false);
        if !location_known || (in_outline && !section_exists) {
            if in_outline && !section_exists {
                warn!(idea = %id, "idea references a missing outline section, moving to brainstorm");
            }
            fields.insert("location".to_string(), Value::String("brainstorm".to_string()));
            fields.remove("sectionId");
        }

        seen_ids.push(id);
        kept.push(idea);
    }
    *ideas = kept;
}

fn normalize_chat(root: &mut Map<String, Value>) {
    let Some(history) = root.get_mut("chatHistory").and_then(Value::as_array_mut) else {
        return;
    };
    for message in history.iter_mut() {
        let Some(fields) = message.as_object_mut() else {
            continue;
        };
        if fields.get("timestamp").is_some_and(|ts| !is_valid_timestamp(ts)) {
            warn!("dropping unparseable chat timestamp during restoration");
            fields.remove("timestamp");
        }
    }
    history.retain(|message| {
        let valid_role = matches!(
            message.get("role").and_then(Value::as_str),
            Some("user") | Some("assistant")
        );
        let valid_content = matches!(message.get("content"), Some(Value::String(_)));
        if !valid_role || !valid_content {
            warn!("skipping malformed chat message during restoration");
        }
        valid_role && valid_content
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdeaLocation;
    use serde_json::json;

    fn message(role: &str, content: &str, timestamp: &str) -> Value {
        json!({ "role": role, "content": content, "timestamp": timestamp })
    }

    #[test]
    fn duplicate_chat_message_is_not_appended() {
        let m = message("user", "hi there", "2025-03-01T12:00:00Z");
        let current = json!({ "chatHistory": [m.clone()] });
        let incoming = json!({ "chatHistory": [m] });

        let merged = reconcile(&current, &incoming);
        assert_eq!(merged["chatHistory"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn distinct_chat_message_is_appended_at_the_end() {
        let current = json!({
            "chatHistory": [message("user", "hi there", "2025-03-01T12:00:00Z")]
        });
        let incoming = json!({
            "chatHistory": [message("assistant", "hello!", "2025-03-01T12:00:05Z")]
        });

        let merged = reconcile(&current, &incoming);
        let history = merged["chatHistory"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["content"], "hello!");
    }

    #[test]
    fn same_content_different_timestamp_counts_as_new() {
        let current = json!({
            "chatHistory": [message("user", "hi there", "2025-03-01T12:00:00Z")]
        });
        let incoming = json!({
            "chatHistory": [message("user", "hi there", "2025-03-01T12:00:09Z")]
        });

        let merged = reconcile(&current, &incoming);
        assert_eq!(merged["chatHistory"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn timestampless_candidate_matches_on_role_and_content() {
        let current = json!({
            "chatHistory": [message("user", "hi there", "2025-03-01T12:00:00Z")]
        });
        let incoming = json!({
            "chatHistory": [{ "role": "user", "content": "hi there" }]
        });

        let merged = reconcile(&current, &incoming);
        assert_eq!(merged["chatHistory"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn incoming_ideas_array_replaces_local_one() {
        let current = json!({
            "plan": { "ideas": [{ "id": "a", "content": "x", "location": "brainstorm" }] }
        });
        let incoming = json!({
            "plan": { "ideas": [
                { "id": "a", "content": "x" },
                { "id": "b", "content": "y", "location": "brainstorm", "aiGenerated": true },
            ]}
        });

        let merged = reconcile(&current, &incoming);
        let ideas = merged["plan"]["ideas"].as_array().unwrap();
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[1]["id"], "b");
    }

    #[test]
    fn nested_objects_merge_recursively_and_scalars_are_replaced() {
        let current = json!({
            "metadata": { "title": "old", "description": "keep me" },
            "write": { "content": "draft", "wordCount": 1 },
        });
        let incoming = json!({
            "metadata": { "title": "new" },
        });

        let merged = reconcile(&current, &incoming);
        assert_eq!(merged["metadata"]["title"], "new");
        assert_eq!(merged["metadata"]["description"], "keep me");
        assert_eq!(merged["write"]["content"], "draft");
    }

    #[test]
    fn reconcile_does_not_mutate_its_inputs() {
        let current = json!({ "metadata": { "title": "old" } });
        let incoming = json!({ "metadata": { "title": "new" } });
        let current_before = current.clone();
        let incoming_before = incoming.clone();

        let _ = reconcile(&current, &incoming);
        assert_eq!(current, current_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn orphaned_outline_idea_is_reassigned_to_brainstorm() {
        let mut value = serde_json::to_value(ProjectDocument::new(None)).unwrap();
        value["plan"] = json!({
            "ideas": [
                { "id": "a", "content": "x", "location": "outline", "sectionId": "gone" },
                { "id": "b", "content": "y", "location": "outline", "sectionId": "intro" },
            ],
            "outline": [{ "id": "intro", "title": "Introduction", "description": "" }],
        });

        let doc = normalize_document(value).unwrap();
        assert_eq!(doc.plan.ideas[0].location, IdeaLocation::Brainstorm);
        assert_eq!(doc.plan.ideas[0].section_id, None);
        assert_eq!(doc.plan.ideas[1].location, IdeaLocation::Outline);
        assert_eq!(doc.plan.ideas[1].section_id.as_deref(), Some("intro"));
    }

    #[test]
    fn malformed_ideas_are_skipped_not_fatal() {
        let mut value = serde_json::to_value(ProjectDocument::new(None)).unwrap();
        value["plan"]["ideas"] = json!([
            { "content": "no id" },
            { "id": "ok", "content": "fine" },
            { "id": "ok", "content": "duplicate id" },
            { "id": "no-content" },
        ]);

        let doc = normalize_document(value).unwrap();
        assert_eq!(doc.plan.ideas.len(), 1);
        assert_eq!(doc.plan.ideas[0].id, "ok");
    }

    #[test]
    fn unknown_current_tab_falls_back_to_plan() {
        let mut value = serde_json::to_value(ProjectDocument::new(None)).unwrap();
        value["metadata"]["currentTab"] = json!("review");
        value["plan"]["ideas"] = json!([{ "id": "a", "content": "keep me" }]);

        let doc = normalize_document(value).unwrap();
        assert_eq!(doc.metadata.current_tab, crate::domain::Tab::Plan);
        // The rest of the document survives the bad scalar.
        assert_eq!(doc.plan.ideas.len(), 1);
    }

    #[test]
    fn unparseable_timestamps_are_dropped_not_fatal() {
        let mut value = serde_json::to_value(ProjectDocument::new(None)).unwrap();
        value["metadata"]["modified"] = json!("yesterday");
        value["chatHistory"] = json!([
            { "role": "user", "content": "kept", "timestamp": "not-a-time" },
        ]);

        let doc = normalize_document(value).unwrap();
        assert_eq!(doc.chat_history.len(), 1);
        assert_eq!(doc.chat_history[0].content, "kept");
    }

    #[test]
    fn malformed_chat_entries_are_skipped() {
        let mut value = serde_json::to_value(ProjectDocument::new(None)).unwrap();
        value["chatHistory"] = json!([
            { "role": "narrator", "content": "nope" },
            { "role": "user", "content": "kept", "timestamp": "2025-03-01T12:00:00Z" },
            { "role": "assistant" },
        ]);

        let doc = normalize_document(value).unwrap();
        assert_eq!(doc.chat_history.len(), 1);
        assert_eq!(doc.chat_history[0].content, "kept");
    }
}
