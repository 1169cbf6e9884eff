//! Decoding raw change-stream documents.

use crate::error::{HubError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A JSON document (field name to value).
pub type Document = Map<String, Value>;

/// A change record decoded from the feed.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeRecord {
    /// A document was inserted.
    Insert { full_document: Document },
    /// A document was modified; only the changed fields are carried.
    Update { updated_fields: Document },
    /// Any other operation type (delete, replace, drop, invalidate, ...).
    Other { operation_type: String },
}

/// Change-stream event envelope. Unknown fields are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    operation_type: String,
    #[serde(default)]
    full_document: Option<Document>,
    #[serde(default)]
    update_description: Option<UpdateDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDescription {
    #[serde(default)]
    updated_fields: Option<Document>,
    // Removed fields are not reported to subscribers.
}

impl ChangeRecord {
    /// Decode a raw change document.
    ///
    /// Fails with [`HubError::MalformedRecord`] when the document does not
    /// have the shape of a known event: no `operationType`, an insert without
    /// a `fullDocument`, or an update without `updateDescription.updatedFields`.
    /// Unknown operation types decode to [`ChangeRecord::Other`].
    pub fn decode(raw: Value) -> Result<Self> {
        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| HubError::MalformedRecord(e.to_string()))?;

        match envelope.operation_type.as_str() {
            "insert" => {
                let full_document = envelope.full_document.ok_or_else(|| {
                    HubError::MalformedRecord("insert event without fullDocument".to_string())
                })?;
                Ok(ChangeRecord::Insert { full_document })
            }
            "update" => {
                let updated_fields = envelope
                    .update_description
                    .and_then(|d| d.updated_fields)
                    .ok_or_else(|| {
                        HubError::MalformedRecord(
                            "update event without updateDescription.updatedFields".to_string(),
                        )
                    })?;
                Ok(ChangeRecord::Update { updated_fields })
            }
            _ => Ok(ChangeRecord::Other {
                operation_type: envelope.operation_type,
            }),
        }
    }

    /// The `operationType` this record was decoded from.
    pub fn operation_type(&self) -> &str {
        match self {
            ChangeRecord::Insert { .. } => "insert",
            ChangeRecord::Update { .. } => "update",
            ChangeRecord::Other { operation_type } => operation_type,
        }
    }
}
