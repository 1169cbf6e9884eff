//! Event projection: classify a change record and keep only the configured
//! fields.
//!
//! Projection is pure and never fails. Inserts are projected from the full
//! document, updates from the changed-fields delta only, so a field that an
//! update did not touch is not reported even though the document still has it.

use crate::error::Result;
use crate::feed::record::{ChangeRecord, Document};
use crate::types::{ChangeKind, FieldSet, Payload};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Field name to stringified value, restricted to the allow-list.
///
/// Entries keep the allow-list order so the wire text is stable. Equality
/// does not depend on order.
#[derive(Clone, Debug, Default)]
pub struct ProjectedEvent {
    entries: Vec<(String, String)>,
}

impl ProjectedEvent {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the wire payload: a flat JSON object of strings.
    pub fn to_payload(&self) -> Result<Payload> {
        Ok(Payload::from(serde_json::to_string(self)?))
    }
}

impl PartialEq for ProjectedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for ProjectedEvent {}

impl Serialize for ProjectedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProjectedEvent {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut event = ProjectedEvent::default();
        for (name, value) in iter {
            let name = name.into();
            if event.get(&name).is_none() {
                event.entries.push((name, value.into()));
            }
        }
        event
    }
}

/// Classify `record` and project it onto `fields`.
///
/// Records of kind [`ChangeKind::Ignored`] yield an empty event.
pub fn project(record: &ChangeRecord, fields: &FieldSet) -> (ProjectedEvent, ChangeKind) {
    match record {
        ChangeRecord::Insert { full_document } => {
            (select(full_document, fields), ChangeKind::Insert)
        }
        ChangeRecord::Update { updated_fields } => {
            (select(updated_fields, fields), ChangeKind::Update)
        }
        ChangeRecord::Other { .. } => (ProjectedEvent::default(), ChangeKind::Ignored),
    }
}

fn select(source: &Document, fields: &FieldSet) -> ProjectedEvent {
    let entries = fields
        .iter()
        .filter_map(|name| source.get(name).map(|value| (name.to_string(), field_text(value))))
        .collect();
    ProjectedEvent { entries }
}

/// Textual form of a field value.
///
/// Strings are taken verbatim, other scalars use their literal text, nested
/// documents and arrays their compact JSON text.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// Projection bound to the configured field set.
#[derive(Clone, Debug)]
pub struct Projector {
    fields: FieldSet,
}

impl Projector {
    pub fn new(fields: FieldSet) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn project(&self, record: &ChangeRecord) -> (ProjectedEvent, ChangeKind) {
        project(record, &self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert(doc: Value) -> ChangeRecord {
        ChangeRecord::Insert {
            full_document: doc.as_object().unwrap().clone(),
        }
    }

    fn update(delta: Value) -> ChangeRecord {
        ChangeRecord::Update {
            updated_fields: delta.as_object().unwrap().clone(),
        }
    }

    fn payload_json(event: &ProjectedEvent) -> Value {
        serde_json::from_str(event.to_payload().unwrap().as_str()).unwrap()
    }

    #[test]
    fn test_insert_keeps_only_configured_fields() {
        let fields = FieldSet::new(["name", "email"]);
        let record = insert(json!({"name": "John Doe", "email": "x@y.com", "age": 30}));

        let (event, kind) = project(&record, &fields);

        assert_eq!(kind, ChangeKind::Insert);
        assert_eq!(
            payload_json(&event),
            json!({"name": "John Doe", "email": "x@y.com"})
        );
    }

    #[test]
    fn test_update_reports_delta_only() {
        let fields = FieldSet::new(["name", "email"]);
        let record = update(json!({"email": "new@y.com"}));

        let (event, kind) = project(&record, &fields);

        assert_eq!(kind, ChangeKind::Update);
        assert_eq!(payload_json(&event), json!({"email": "new@y.com"}));
        assert_eq!(event.get("name"), None);
    }

    #[test]
    fn test_other_operations_are_ignored() {
        let fields = FieldSet::new(["name"]);
        for op in ["delete", "replace", "invalidate"] {
            let record = ChangeRecord::Other {
                operation_type: op.to_string(),
            };
            let (event, kind) = project(&record, &fields);
            assert_eq!(kind, ChangeKind::Ignored);
            assert!(event.is_empty());
        }
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let fields = FieldSet::new(["title", "missing"]);
        let (event, _) = project(&insert(json!({"title": "A"})), &fields);
        assert_eq!(event.len(), 1);
        assert_eq!(event.to_payload().unwrap().as_str(), r#"{"title":"A"}"#);
    }

    #[test]
    fn test_no_matching_fields_gives_empty_object() {
        let fields = FieldSet::new(["title"]);
        let (event, kind) = project(&update(json!({"views": 3})), &fields);
        assert_eq!(kind, ChangeKind::Update);
        assert_eq!(event.to_payload().unwrap().as_str(), "{}");
    }

    #[test]
    fn test_payload_follows_field_order() {
        let fields = FieldSet::new(["title", "text"]);
        let (event, _) = project(
            &insert(json!({"text": "B", "extra": "C", "title": "A"})),
            &fields,
        );
        assert_eq!(
            event.to_payload().unwrap().as_str(),
            r#"{"title":"A","text":"B"}"#
        );
    }

    #[test]
    fn test_field_text_forms() {
        assert_eq!(field_text(&json!("plain")), "plain");
        assert_eq!(field_text(&json!(30)), "30");
        assert_eq!(field_text(&json!(2.5)), "2.5");
        assert_eq!(field_text(&json!(true)), "true");
        assert_eq!(field_text(&json!(null)), "null");
        assert_eq!(field_text(&json!({"city": "Oslo"})), r#"{"city":"Oslo"}"#);
        assert_eq!(field_text(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_nested_values_are_strings_on_the_wire() {
        let fields = FieldSet::new(["address"]);
        let (event, _) = project(&insert(json!({"address": {"city": "Oslo"}})), &fields);
        assert_eq!(
            payload_json(&event),
            json!({"address": "{\"city\":\"Oslo\"}"})
        );
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: ProjectedEvent = vec![("a", "1"), ("b", "2")].into_iter().collect();
        let b: ProjectedEvent = vec![("b", "2"), ("a", "1")].into_iter().collect();
        let c: ProjectedEvent = vec![("a", "1")].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
