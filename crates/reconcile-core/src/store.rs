//! ItemStore: in-memory CRUD over the local snapshot of one document.
//!
//! The store owns id allocation (monotonic watermark, ids are never reused)
//! and a dirty flag the sync controller consumes to decide whether anything
//! needs persisting.

use crate::document::{Document, Item, Payload};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Update or delete of an id the store does not hold. A programming
    /// contract violation on the caller's side, safe to ignore: the store is
    /// left unchanged.
    #[error("no item with id {0}")]
    NotFound(u64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The local working copy of one namespace's document.
#[derive(Debug)]
pub struct ItemStore {
    doc: Document,
    dirty: bool,
}

impl ItemStore {
    /// An empty store for a namespace that has never been persisted.
    pub fn new() -> Self {
        Self::from_document(Document::new())
    }

    /// Populate from a freshly decoded remote document.
    ///
    /// The watermark is clamped above every present id, so documents written
    /// by legacy clients can never cause an id to be allocated twice.
    pub fn from_document(doc: Document) -> Self {
        let mut store = Self { doc, dirty: false };
        store.doc.next_id = store.doc.next_id.max(store.doc.id_floor());
        store
    }

    /// Allocate the next id and append a new item. Never fails.
    pub fn create(&mut self, payload: Payload) -> Item {
        let item = Item::new(self.doc.next_id, payload);
        self.doc.next_id += 1;
        self.doc.items.push(item.clone());
        self.dirty = true;
        item
    }

    /// Replace the payload of an existing item.
    pub fn update(&mut self, id: u64, payload: Payload) -> Result<()> {
        let item = self
            .doc
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))?;
        *item = Item::new(id, payload);
        self.dirty = true;
        Ok(())
    }

    /// Remove an item. The id is retired, never reallocated.
    pub fn delete(&mut self, id: u64) -> Result<()> {
        let before = self.doc.items.len();
        self.doc.items.retain(|item| item.id != id);
        if self.doc.items.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.dirty = true;
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Item> {
        self.doc.items.iter().find(|item| item.id == id)
    }

    /// Snapshot view of the items, stable order.
    pub fn items(&self) -> &[Item] {
        &self.doc.items
    }

    pub fn len(&self) -> usize {
        self.doc.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.items.is_empty()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Owned copy of the current document, for a save cycle.
    pub fn snapshot(&self) -> Document {
        self.doc.clone()
    }

    /// Adopt a merged document as the new local snapshot.
    ///
    /// The dirty flag is left untouched: mutations accepted while a save was
    /// in flight still need persisting. The watermark never decreases.
    pub fn replace(&mut self, doc: Document) {
        let floor = self.doc.next_id;
        self.doc = doc;
        self.doc.next_id = self.doc.next_id.max(floor).max(self.doc.id_floor());
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the dirty flag (start of a save cycle).
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Restore the dirty flag (a save cycle that could not complete).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}
