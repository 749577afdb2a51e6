//! Document model: identified items and the unit of remote persistence.
//!
//! A `Document` is what one namespace of the remote store holds: a monotonic
//! id watermark (`nextId`) plus an ordered list of items. Item payloads are
//! opaque to this crate; applications decide what fields an item carries
//! (`{thing, done}` for a to-do list, `{text, name, size, x, y}` for a note
//! on a canvas). On the wire an item is a flat JSON object with the payload
//! fields spread next to the `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque application-owned item fields.
///
/// `serde_json`'s map keeps keys sorted, which is what makes document
/// encoding canonical (see [`Document::encode`]).
pub type Payload = serde_json::Map<String, Value>;

/// A user-visible record with a stable identifier.
///
/// The `id` is immutable once assigned and never reused after deletion
/// within the same document lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Item {
    pub fn new(id: u64, mut payload: Payload) -> Self {
        // The id field is owned by the store; a payload must not smuggle
        // its own copy onto the wire.
        payload.remove("id");
        Self { id, payload }
    }
}

/// The unit of remote persistence for one namespace.
///
/// Invariant: every id in `items` is `< next_id`. `next_id` only ever grows;
/// it is the watermark that lets the merge engine tell a locally-deleted old
/// item apart from a concurrently-added new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "nextId")]
    pub next_id: u64,
    pub items: Vec<Item>,
}

impl Document {
    /// An empty document, as created on first use of a namespace.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            items: Vec::new(),
        }
    }

    /// Smallest watermark consistent with the ids actually present.
    ///
    /// Documents written by legacy clients can carry ids at or above their
    /// recorded `nextId`; callers that allocate ids clamp with this first.
    pub(crate) fn id_floor(&self) -> u64 {
        self.items
            .iter()
            .map(|item| item.id.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert_eq!(doc.next_id, 1);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_item_new_strips_rogue_id_field() {
        let item = Item::new(3, payload(json!({"id": 99, "thing": "milk"})));
        assert_eq!(item.id, 3);
        assert!(!item.payload.contains_key("id"));
        assert_eq!(item.payload["thing"], json!("milk"));
    }

    #[test]
    fn test_id_floor_tracks_highest_id() {
        let doc = Document {
            next_id: 1,
            items: vec![
                Item::new(5, Payload::new()),
                Item::new(2, Payload::new()),
            ],
        };
        assert_eq!(doc.id_floor(), 6);
        assert_eq!(Document::new().id_floor(), 0);
    }
}
