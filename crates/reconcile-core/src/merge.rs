//! Merge engine: reconcile a local document with a freshly-fetched remote one.
//!
//! The remote store is shared, unversioned, mutable state with multiple
//! uncoordinated writers and no lock; this merge is the sole mitigation for
//! lost updates. The policy is three-way, id-keyed, local-delete-wins /
//! remote-add-wins:
//!
//! - every local item is kept as-is (local edits and local deletions take
//!   precedence for ids this session already knew about)
//! - a remote item is recovered only when its id is unknown locally **and**
//!   at or above the local watermark, i.e. it was created by another writer
//!   after this session's last known state. Remote items below the watermark
//!   that are absent locally were deleted here, and stay deleted.
//!
//! The deliberate tradeoff: two sessions editing the same id resolve
//! last-local-write-wins, and a concurrent remote edit to an item this
//! session also touched cannot be recovered. That is acceptable for
//! low-contention, human-speed editing by a handful of cooperating users;
//! this is not a CRDT.

use crate::document::Document;
use std::collections::HashSet;

impl Document {
    /// Combine `self` (the local snapshot) with `remote` into the document
    /// to persist.
    pub fn merge(&self, remote: &Document) -> Document {
        let next_id = self.next_id.max(remote.next_id);

        let known: HashSet<u64> = self.items.iter().map(|item| item.id).collect();
        let mut items = self.items.clone();
        items.extend(
            remote
                .items
                .iter()
                .filter(|item| item.id >= self.next_id && !known.contains(&item.id))
                .cloned(),
        );

        Document { next_id, items }
    }
}
