//! reconcile-core: client-side synchronization of an identified-item
//! collection against a shared remote JSON document.
//!
//! This crate provides the core functionality for:
//! - An in-memory store of uniquely-identified items (create/update/delete)
//! - A wire codec for the document format, with legacy-shape migration
//! - An id-keyed merge that reconciles concurrent uncoordinated writers
//! - A debounced sync controller that coalesces edits into single writes
//! - A `Transport` trait abstraction over the remote document store
//!
//! The remote store is plain shared mutable state - no locks, no versions,
//! no CAS. The merge policy (local-delete-wins, remote-add-wins, see
//! [`merge`]) is the sole mitigation for lost updates, which is adequate for
//! low-contention, human-speed editing by a few cooperating clients.

pub mod codec;
pub mod controller;
pub mod document;
pub mod events;
pub mod merge;
pub mod store;
pub mod transport;

pub use codec::DecodeError;
pub use controller::{SyncClient, SyncConfig, SyncError, SyncState};
pub use document::{Document, Item, Payload};
pub use events::SyncEvent;
pub use store::{ItemStore, StoreError};
pub use transport::{InMemoryTransport, Transport, TransportError};
