//! crates/writing_project_core/src/collect.rs
//!
//! The module-collection protocol: every editing surface may register a
//! collector exposing its current on-screen state as a document fragment.
//! Collectors are invoked only at assembly time, never per keystroke.

use std::sync::Mutex;

use serde_json::{Map, Value};

/// A partial document keyed by one or more top-level `ProjectDocument`
/// fields, e.g. `{ "write": { "content": "...", "wordCount": 42 } }`.
pub type DocumentFragment = Value;

/// A capability exposing one surface's authoritative state.
///
/// `collect` must be synchronous, side-effect-free on the surface's own
/// state, and derived from the surface's current authoritative presentation,
/// never a stale cached copy.
pub trait ModuleCollector: Send + Sync {
    fn name(&self) -> &str;
    fn collect(&self) -> DocumentFragment;
}

/// An ordered mapping of registered collectors.
///
/// Iteration order is first-registration order, so fragment merge order over
/// overlapping keys is defined. Re-registering a name replaces the collector
/// in place, keeping its original slot.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: Mutex<Vec<Box<dyn ModuleCollector>>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, collector: Box<dyn ModuleCollector>) {
        let mut collectors = self
            .collectors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match collectors.iter().position(|c| c.name() == collector.name()) {
            Some(slot) => collectors[slot] = collector,
            None => collectors.push(collector),
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut collectors = self
            .collectors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = collectors.len();
        collectors.retain(|c| c.name() != name);
        collectors.len() != before
    }

    /// Asks every registered collector for its fragment, in registration
    /// order.
    pub fn collect_all(&self) -> Vec<(String, DocumentFragment)> {
        let collectors = self
            .collectors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        collectors
            .iter()
            .map(|c| (c.name().to_string(), c.collect()))
            .collect()
    }
}

/// A collector holding a fragment posted by a remote surface (a browser
/// posting its state at save time).
///
/// A posted fragment describes the save it arrived with, nothing later.
/// Replaying it into a subsequent assembly would overwrite changes made in
/// the meantime (assistant reconciliation in particular), so `collect`
/// drains the fragment: later calls yield `Null`, which the assembly step
/// ignores, until a new fragment is posted.
pub struct StaticCollector {
    name: String,
    fragment: Mutex<Option<DocumentFragment>>,
}

impl StaticCollector {
    pub fn new(name: impl Into<String>, fragment: DocumentFragment) -> Self {
        Self {
            name: name.into(),
            fragment: Mutex::new(Some(fragment)),
        }
    }

    pub fn set_fragment(&self, fragment: DocumentFragment) {
        *self
            .fragment
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(fragment);
    }
}

impl ModuleCollector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> DocumentFragment {
        self.fragment
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .unwrap_or(Value::Null)
    }
}

/// Merges one fragment into a serialized document at assembly time.
///
/// For each top-level key present in the fragment, the merge is shallow at
/// that key's own object level: the fragment's object fields overwrite the
/// base's fields of the same name, fields the fragment omits are preserved.
/// Non-object fragment values replace the base value outright.
pub fn apply_fragment(base: &mut Map<String, Value>, fragment: &DocumentFragment) {
    let Some(fragment) = fragment.as_object() else {
        return;
    };
    for (key, incoming) in fragment {
        match (base.get_mut(key), incoming.as_object()) {
            (Some(Value::Object(existing)), Some(incoming_fields)) => {
                for (field, value) in incoming_fields {
                    existing.insert(field.clone(), value.clone());
                }
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shallow_merge_preserves_omitted_fields() {
        let mut base = json!({
            "write": { "content": "old", "wordCount": 1 },
            "edit": { "content": "draft", "suggestions": [] },
        });
        let fragment = json!({ "write": { "content": "new draft here" } });
        apply_fragment(base.as_object_mut().unwrap(), &fragment);

        assert_eq!(base["write"]["content"], "new draft here");
        // wordCount was not in the fragment, so the base value survives.
        assert_eq!(base["write"]["wordCount"], 1);
        assert_eq!(base["edit"]["content"], "draft");
    }

    #[test]
    fn non_object_fragment_value_replaces_wholesale() {
        let mut base = json!({ "chatHistory": [{"role": "user"}] });
        let fragment = json!({ "chatHistory": [] });
        apply_fragment(base.as_object_mut().unwrap(), &fragment);
        assert_eq!(base["chatHistory"], json!([]));
    }

    #[test]
    fn reregistering_a_name_replaces_in_place() {
        let registry = CollectorRegistry::new();
        registry.register(Box::new(StaticCollector::new("plan", json!({"plan": {"ideas": []}}))));
        registry.register(Box::new(StaticCollector::new("write", json!({"write": {"content": "a"}}))));
        // Replace the plan collector; it must keep its first slot.
        registry.register(Box::new(StaticCollector::new("plan", json!({"plan": {"ideas": [1]}}))));

        let fragments = registry.collect_all();
        let names: Vec<&str> = fragments.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["plan", "write"]);
        assert_eq!(fragments[0].1["plan"]["ideas"], json!([1]));
    }

    #[test]
    fn static_collector_drains_its_fragment_on_collect() {
        let collector = StaticCollector::new("write", json!({"write": {"content": "v1"}}));
        assert_eq!(collector.collect()["write"]["content"], "v1");
        // The posted fragment is consumed; nothing left to replay.
        assert_eq!(collector.collect(), Value::Null);
        collector.set_fragment(json!({"write": {"content": "v2"}}));
        assert_eq!(collector.collect()["write"]["content"], "v2");
    }

    #[test]
    fn null_fragment_leaves_the_base_untouched() {
        let mut base = json!({ "write": { "content": "kept" } });
        apply_fragment(base.as_object_mut().unwrap(), &Value::Null);
        assert_eq!(base["write"]["content"], "kept");
    }

    #[test]
    fn unregister_removes_collector() {
        let registry = CollectorRegistry::new();
        registry.register(Box::new(StaticCollector::new("plan", json!({}))));
        assert!(registry.unregister("plan"));
        assert!(!registry.unregister("plan"));
        assert!(registry.collect_all().is_empty());
    }
}
