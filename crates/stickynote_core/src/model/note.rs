//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical in-memory `Note` shared by sync and view layers.
//! - Define the stored document shape and its normalization into `Note`.
//!
//! # Invariants
//! - `NoteId` values are assigned by the document store, never by clients.
//! - Missing coordinates normalize to `(0, 0)` in exactly one place:
//!   `NoteDocument::into_note`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Opaque store-assigned note identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One sticky note as seen by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier, unique within one collection.
    pub id: NoteId,
    /// Free-form note body.
    pub text: String,
    /// Canvas x coordinate.
    pub x: f64,
    /// Canvas y coordinate.
    pub y: f64,
}

impl Note {
    pub fn new(id: impl Into<NoteId>, text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            x,
            y,
        }
    }

    /// Returns the position after applying a drag displacement.
    pub fn displaced(&self, dx: f64, dy: f64) -> (f64, f64) {
        (self.x + dx, self.y + dy)
    }
}

/// Content submitted when creating a note.
///
/// Coordinates are optional; notes created from plain text input carry
/// only `text` and read back at `(0, 0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub text: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl NoteDraft {
    /// Creates a text-only draft.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x: None,
            y: None,
        }
    }

    /// Creates a draft placed at an explicit position.
    pub fn at(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x: Some(x),
            y: Some(y),
        }
    }

    /// Returns whether every given coordinate can be stored as a JSON number.
    pub fn has_finite_position(&self) -> bool {
        self.x.map_or(true, f64::is_finite) && self.y.map_or(true, f64::is_finite)
    }

    /// Converts the draft to its stored document shape.
    pub fn to_document(&self) -> NoteDocument {
        NoteDocument {
            text: self.text.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

/// Stored shape of a note document: `{ text, x?, y? }`.
///
/// Older documents predate positioning and lack `x`/`y`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl NoteDocument {
    /// Decodes a raw JSON document body.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(fields.clone()))
    }

    /// Encodes this document as a JSON object body.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::from(self.text.as_str()));
        if let Some(x) = self.x {
            fields.insert("x".to_string(), Value::from(x));
        }
        if let Some(y) = self.y {
            fields.insert("y".to_string(), Value::from(y));
        }
        fields
    }

    /// Normalizes this document into a full `Note`.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            text: self.text,
            x: self.x.unwrap_or(0.0),
            y: self.y.unwrap_or(0.0),
        }
    }
}

/// JSON numbers cannot hold NaN or infinities; `serde_json` would store
/// them as `null`, which reads back as the origin.
pub fn is_finite_position(x: f64, y: f64) -> bool {
    x.is_finite() && y.is_finite()
}

/// Builds the partial document body for a position-only update.
pub fn position_patch(x: f64, y: f64) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("x".to_string(), Value::from(x));
    patch.insert("y".to_string(), Value::from(y));
    patch
}

#[cfg(test)]
mod tests {
    use super::{is_finite_position, position_patch, NoteDocument, NoteDraft, NoteId};
    use serde_json::json;

    #[test]
    fn non_finite_coordinates_are_detected() {
        assert!(is_finite_position(-3.5, 1e300));
        assert!(!is_finite_position(f64::NAN, 0.0));
        assert!(!is_finite_position(0.0, f64::INFINITY));
        assert!(NoteDraft::text("plain").has_finite_position());
        assert!(!NoteDraft::at("far", f64::NEG_INFINITY, 0.0).has_finite_position());
    }

    #[test]
    fn document_without_coordinates_normalizes_to_origin() {
        let raw = json!({ "text": "legacy" });
        let doc = NoteDocument::from_fields(raw.as_object().unwrap()).unwrap();
        let note = doc.into_note(NoteId::new("a1"));
        assert_eq!(note.text, "legacy");
        assert_eq!((note.x, note.y), (0.0, 0.0));
    }

    #[test]
    fn document_with_integer_coordinates_decodes_as_float() {
        let raw = json!({ "text": "placed", "x": 12, "y": -3 });
        let doc = NoteDocument::from_fields(raw.as_object().unwrap()).unwrap();
        let note = doc.into_note(NoteId::new("b2"));
        assert_eq!((note.x, note.y), (12.0, -3.0));
    }

    #[test]
    fn document_with_wrong_coordinate_type_is_rejected() {
        let raw = json!({ "text": "broken", "x": "left" });
        assert!(NoteDocument::from_fields(raw.as_object().unwrap()).is_err());
    }

    #[test]
    fn text_only_draft_omits_coordinates_from_stored_body() {
        let fields = NoteDraft::text("buy milk").to_document().to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["text"], json!("buy milk"));
    }

    #[test]
    fn position_patch_touches_only_coordinates() {
        let patch = position_patch(15.0, 5.0);
        assert_eq!(patch.len(), 2);
        assert!(!patch.contains_key("text"));
    }
}
