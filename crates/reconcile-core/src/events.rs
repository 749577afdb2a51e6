//! Sync lifecycle events, for embedders that surface save/refresh indicators.
//!
//! Events are delivered over a `tokio::sync::broadcast` channel obtained from
//! [`SyncClient::subscribe`](crate::controller::SyncClient::subscribe); drop
//! the receiver to unsubscribe. Delivery is best-effort: a subscriber that
//! falls behind loses the oldest events, never blocks the sync driver.

use serde::Serialize;

/// Emitted by the sync driver as cycles run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A refresh cycle adopted a remote document.
    Loaded { namespace: String, items: usize },

    /// A save cycle wrote the merged document to the remote store.
    Saved {
        namespace: String,
        /// Concurrent additions from other writers recovered by the merge.
        recovered: usize,
    },

    /// A save cycle found the remote already up to date and skipped the write.
    SaveSkipped { namespace: String },

    /// A save cycle failed; the local snapshot is retained and the next
    /// debounced cycle retries.
    SaveFailed { namespace: String, reason: String },

    /// A manual refresh could not reach the remote store.
    RefreshFailed { namespace: String, reason: String },
}
