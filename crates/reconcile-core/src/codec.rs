//! Wire codec: translate between [`Document`] and the remote JSON text.
//!
//! Two shapes are accepted on decode:
//! - `{ "nextId": n, "items": [...] }` - the current format
//! - `[...]` - the legacy format (a bare item array, no watermark); the
//!   watermark is derived as `max(ids) + 1`
//!
//! Decoding fails closed: text that is not valid JSON, or an item without a
//! non-negative integer `id`, is a [`DecodeError`] rather than a document
//! with silently-missing fields.

use crate::document::{Document, Item};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// The two document shapes found in the remote store.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireDocument {
    Current(Document),
    Legacy(Vec<Item>),
}

impl Document {
    /// Parse remote text, migrating the legacy shape on the fly.
    pub fn decode(text: &str) -> Result<Self> {
        match serde_json::from_str(text)? {
            WireDocument::Current(doc) => Ok(doc),
            WireDocument::Legacy(items) => {
                let next_id = items.iter().map(|item| item.id).max().unwrap_or(0).saturating_add(1);
                Ok(Document { next_id, items })
            }
        }
    }

    /// Canonical JSON text for this document.
    ///
    /// Key order is stable (`nextId` before `items`, payload keys sorted) and
    /// whitespace is fixed, so semantically-unchanged documents encode to
    /// byte-identical text. The sync controller relies on this to skip
    /// redundant writes.
    pub fn encode(&self) -> String {
        serde_json::to_string_pretty(self).expect("document serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Payload;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_decode_current_format() {
        let doc = Document::decode(r#"{"nextId": 3, "items": [{"id": 1, "thing": "melk", "done": false}]}"#)
            .unwrap();
        assert_eq!(doc.next_id, 3);
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].id, 1);
        assert_eq!(doc.items[0].payload["thing"], json!("melk"));
    }

    #[test]
    fn test_decode_legacy_array_derives_watermark() {
        let doc = Document::decode(r#"[{"id":5,"x":1},{"id":2,"x":2}]"#).unwrap();
        assert_eq!(doc.next_id, 6);
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].id, 5);
        assert_eq!(doc.items[1].id, 2);
    }

    #[test]
    fn test_decode_legacy_empty_array() {
        let doc = Document::decode("[]").unwrap();
        assert_eq!(doc.next_id, 1);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_decode_legacy_hash_style_ids() {
        // Content-hash id assignment from an abandoned client variant:
        // enormous ids still decode, and still derive a sane watermark.
        let doc = Document::decode(r#"[{"id": 1755021761234, "text": "hei"}]"#).unwrap();
        assert_eq!(doc.next_id, 1755021761235);
    }

    #[test]
    fn test_decode_fails_closed() {
        assert!(Document::decode("not json").is_err());
        // Object missing the watermark is neither shape.
        assert!(Document::decode(r#"{"items": []}"#).is_err());
        // Items without a usable integer id are rejected, not defaulted.
        assert!(Document::decode(r#"[{"thing": "melk"}]"#).is_err());
        assert!(Document::decode(r#"[{"id": "melk"}]"#).is_err());
        assert!(Document::decode(r#"[{"id": -4}]"#).is_err());
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let doc = Document {
            next_id: 7,
            items: vec![
                Item::new(2, payload(json!({"thing": "melk", "done": true}))),
                Item::new(6, payload(json!({"thing": "brød", "done": false}))),
            ],
        };
        let decoded = Document::decode(&doc.encode()).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_encode_is_canonical_across_key_insertion_order() {
        let mut first = Payload::new();
        first.insert("thing".into(), json!("melk"));
        first.insert("done".into(), json!(false));

        let mut second = Payload::new();
        second.insert("done".into(), json!(false));
        second.insert("thing".into(), json!("melk"));

        let a = Document { next_id: 2, items: vec![Item::new(1, first)] };
        let b = Document { next_id: 2, items: vec![Item::new(1, second)] };
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn test_encode_emits_current_format() {
        let text = Document::new().encode();
        assert!(text.contains("\"nextId\": 1"));
        assert!(text.contains("\"items\": []"));
    }
}
