//! Core types for the change hub.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifier assigned to a subscriber when it is registered.
///
/// Unique within one registry. Used for diagnostics and as the registry's
/// map key; handle identity is still the handle itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a change record after classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new document; projected from the full document.
    Insert,
    /// A modified document; projected from the changed fields only.
    Update,
    /// Any other operation (delete, replace, invalidate, ...). Never broadcast.
    Ignored,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Ignored => "ignored",
        }
    }

    /// Whether records of this kind reach the dispatcher.
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, ChangeKind::Ignored)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered allow-list of field names kept by projection.
///
/// Immutable once built. Duplicate names keep their first position.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FieldSet(Arc<[String]>);

impl FieldSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        FieldSet(fields.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|f| f == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Parses comma-separated names; blank entries are dropped.
impl FromStr for FieldSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldSet::new(
            s.split(',').map(str::trim).filter(|name| !name.is_empty()),
        ))
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FieldSet::new(iter)
    }
}

/// A serialized broadcast message: UTF-8 JSON text sent as one text frame.
///
/// Clones share the same buffer, so one payload can be handed to every
/// subscriber of a broadcast.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Payload(Arc<str>);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({})", self.0)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload(text.into())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_set_dedupes_keeping_first() {
        let fields = FieldSet::new(["name", "email", "name"]);
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["name", "email"]);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_field_set_from_str() {
        let fields: FieldSet = " title, text,,  ".parse().unwrap();
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["title", "text"]);
        assert_eq!(fields.to_string(), "title,text");
    }

    #[test]
    fn test_change_kind_broadcast() {
        assert!(ChangeKind::Insert.is_broadcast());
        assert!(ChangeKind::Update.is_broadcast());
        assert!(!ChangeKind::Ignored.is_broadcast());
    }

    #[test]
    fn test_diagnostic_text() {
        assert_eq!(ChangeKind::Update.to_string(), "update");
        assert_eq!(SubscriberId(7).to_string(), "#7");
        assert_eq!(format!("{:?}", SubscriberId(7)), "SubscriberId(7)");
    }

    #[test]
    fn test_payload_clones_share_buffer() {
        let payload = Payload::from("{\"a\":\"1\"}");
        let copy = payload.clone();
        assert!(std::ptr::eq(payload.as_str(), copy.as_str()));
    }
}
