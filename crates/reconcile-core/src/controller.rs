//! Debounced sync controller: decides when to talk to the remote store.
//!
//! One [`SyncClient`] owns the local snapshot for one namespace and the
//! timing of every remote read and write for it. Lifecycle:
//!
//! 1. [`SyncClient::connect`] fetches and decodes the remote document
//!    (`Idle -> Loading -> Ready`); an absent namespace is an empty document,
//!    a transport failure is returned to the caller with nothing retried.
//! 2. Every local mutation restarts a debounce timer (`Ready -> Ready`), so
//!    a burst of rapid edits coalesces into a single remote write.
//! 3. When the timer fires (`Ready -> Saving`), the driver re-fetches the
//!    remote document, merges it with the local snapshot, and writes the
//!    result - unless the merged text is byte-identical to the re-encoded
//!    remote, in which case the write is skipped. Two idle sessions waking
//!    on their timers therefore settle instead of ping-ponging writes.
//! 4. The merged document is adopted as the new local snapshot either way,
//!    making concurrent additions from other writers visible locally.
//!
//! Mutations are never blocked: edits made while a save is in flight land in
//! the snapshot, survive adoption (adoption merges rather than replaces),
//! and schedule exactly one follow-up cycle. Saves for one namespace never
//! overlap; clients for different namespaces are fully independent.

use crate::document::{Document, Item, Payload};
use crate::events::SyncEvent;
use crate::store::{ItemStore, StoreError};
use crate::transport::{Transport, TransportError};

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load remote document: {0}")]
    Load(#[source] TransportError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Ready,
    Saving,
}

/// Controller tunables, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before a save cycle runs.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// State shared between the client handle and its driver task.
struct Shared {
    store: Mutex<ItemStore>,
    state: Mutex<SyncState>,
}

enum Command {
    Mutated,
    Refresh,
    Shutdown,
}

/// Handle to a synchronized namespace.
///
/// Mutations are synchronous and always accepted; all remote traffic happens
/// on a driver task this handle owns. Dropping the handle stops the driver
/// (flushing unsaved work); [`SyncClient::shutdown`] does the same but waits
/// for the flush to finish.
pub struct SyncClient {
    shared: Arc<Shared>,
    namespace: String,
    tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SyncEvent>,
    driver: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Fetch the remote document for `namespace` and start the sync driver.
    ///
    /// A transport failure here is surfaced to the caller so the embedder can
    /// show an error state; falling back to an empty document would look like
    /// a wipe of existing data. Malformed remote content, by contrast, is
    /// recoverable: it decodes as an empty document with a warning.
    pub async fn connect<T>(
        transport: T,
        namespace: impl Into<String>,
        config: SyncConfig,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let namespace = namespace.into();

        let doc = fetch_document(&transport, &namespace)
            .await
            .map_err(SyncError::Load)?;
        info!(namespace = %namespace, items = doc.len(), "loaded remote document");

        let shared = Arc::new(Shared {
            store: Mutex::new(ItemStore::from_document(doc)),
            state: Mutex::new(SyncState::Ready),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);

        let driver = Driver {
            shared: Arc::clone(&shared),
            transport,
            namespace: namespace.clone(),
            config,
            rx,
            events: events.clone(),
        };
        let handle = tokio::spawn(driver.run());

        Ok(Self {
            shared,
            namespace,
            tx,
            events,
            driver: Some(handle),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> SyncState {
        *self.shared.state.lock().unwrap()
    }

    /// Whether the snapshot holds mutations not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.shared.store.lock().unwrap().is_dirty()
    }

    /// Create an item. Never fails; the new id is assigned immediately.
    pub fn create(&self, payload: Payload) -> Item {
        let item = self.shared.store.lock().unwrap().create(payload);
        self.nudge();
        item
    }

    /// Replace an item's payload.
    pub fn update(&self, id: u64, payload: Payload) -> std::result::Result<(), StoreError> {
        self.shared.store.lock().unwrap().update(id, payload)?;
        self.nudge();
        Ok(())
    }

    /// Delete an item. Its id is retired for the document's lifetime.
    pub fn delete(&self, id: u64) -> std::result::Result<(), StoreError> {
        self.shared.store.lock().unwrap().delete(id)?;
        self.nudge();
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<Item> {
        self.shared.store.lock().unwrap().get(id).cloned()
    }

    /// Snapshot of the current items, stable order.
    pub fn items(&self) -> Vec<Item> {
        self.shared.store.lock().unwrap().items().to_vec()
    }

    /// Owned copy of the current local document.
    pub fn document(&self) -> Document {
        self.shared.store.lock().unwrap().snapshot()
    }

    /// Ask the driver for a refresh cycle outside the debounce timer.
    ///
    /// Does not cancel a pending save. Completion is reported through the
    /// event stream (`Loaded` / `RefreshFailed`).
    pub fn refresh(&self) {
        let _ = self.tx.send(Command::Refresh);
    }

    /// Subscribe to sync lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Stop the driver, flushing unsaved work first.
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.driver.take() {
            let _ = handle.await;
        }
    }

    fn nudge(&self) {
        let _ = self.tx.send(Command::Mutated);
    }
}

/// Fetch and decode one namespace. Absent and malformed documents both
/// resolve to an empty one; only transport failures propagate.
async fn fetch_document<T: Transport>(
    transport: &T,
    namespace: &str,
) -> std::result::Result<Document, TransportError> {
    match transport.get(namespace).await? {
        Some(text) => match Document::decode(&text) {
            Ok(doc) => Ok(doc),
            Err(err) => {
                warn!(
                    namespace = %namespace,
                    error = %err,
                    "remote document is malformed; starting from an empty one"
                );
                Ok(Document::new())
            }
        },
        None => Ok(Document::new()),
    }
}

/// The driver task: owns the debounce timer and all remote traffic.
struct Driver<T: Transport> {
    shared: Arc<Shared>,
    transport: T,
    namespace: String,
    config: SyncConfig,
    rx: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<SyncEvent>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                Some(at) => tokio::select! {
                    cmd = self.rx.recv() => cmd,
                    _ = tokio::time::sleep_until(at) => {
                        deadline = None;
                        if self.save_cycle().await {
                            deadline = Some(Instant::now() + self.config.debounce);
                        }
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };

            match command {
                Some(Command::Mutated) => {
                    // Restart the quiet-period timer on every edit.
                    deadline = Some(Instant::now() + self.config.debounce);
                }
                Some(Command::Refresh) => self.refresh_cycle().await,
                Some(Command::Shutdown) | None => break,
            }
        }

        // Teardown: do not leave unsaved work behind.
        let dirty = self.shared.store.lock().unwrap().is_dirty();
        if dirty {
            self.save_cycle().await;
        }
    }

    /// One fetch/merge/save cycle. Returns true when another cycle should be
    /// scheduled (retry after failure, or mutations arrived mid-save).
    async fn save_cycle(&mut self) -> bool {
        self.set_state(SyncState::Saving);

        let base = {
            let mut store = self.shared.store.lock().unwrap();
            store.take_dirty();
            store.snapshot()
        };

        // Capture the very latest concurrent state before writing.
        let remote = match fetch_document(&self.transport, &self.namespace).await {
            Ok(doc) => doc,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "fetch before save failed");
                return self.save_failed(err);
            }
        };

        let merged = base.merge(&remote);
        let recovered = merged.len() - base.len();
        let text = merged.encode();

        if text == remote.encode() {
            debug!(namespace = %self.namespace, "remote already up to date, skipping write");
            self.emit(SyncEvent::SaveSkipped {
                namespace: self.namespace.clone(),
            });
        } else {
            if let Err(err) = self.transport.put(&self.namespace, &text).await {
                warn!(namespace = %self.namespace, error = %err, "save failed, keeping local snapshot");
                return self.save_failed(err);
            }
            debug!(
                namespace = %self.namespace,
                bytes = text.len(),
                recovered,
                "saved merged document"
            );
            self.emit(SyncEvent::Saved {
                namespace: self.namespace.clone(),
                recovered,
            });
        }

        // Adopt the merged document. Merging into the current snapshot
        // (instead of replacing it) preserves any mutation accepted while
        // the save was in flight; with a quiet store the two are identical.
        let rearm = {
            let mut store = self.shared.store.lock().unwrap();
            let adopted = store.document().merge(&merged);
            store.replace(adopted);
            store.is_dirty()
        };
        self.set_state(SyncState::Ready);
        rearm
    }

    /// Recover from a failed cycle: snapshot retained, dirty flag restored,
    /// next debounced cycle retries with the then-current local state.
    fn save_failed(&self, err: TransportError) -> bool {
        self.shared.store.lock().unwrap().mark_dirty();
        self.emit(SyncEvent::SaveFailed {
            namespace: self.namespace.clone(),
            reason: err.to_string(),
        });
        self.set_state(SyncState::Ready);
        true
    }

    /// A forced load cycle. Adopts the remote wholesale when the snapshot is
    /// clean; with unsaved local work it merges (local wins) so a refresh can
    /// never drop an edit the debounce timer has not persisted yet.
    async fn refresh_cycle(&mut self) {
        self.set_state(SyncState::Loading);

        match fetch_document(&self.transport, &self.namespace).await {
            Ok(remote) => {
                let items = {
                    let mut store = self.shared.store.lock().unwrap();
                    let adopted = if store.is_dirty() {
                        store.document().merge(&remote)
                    } else {
                        remote
                    };
                    store.replace(adopted);
                    store.len()
                };
                debug!(namespace = %self.namespace, items, "refreshed from remote");
                self.emit(SyncEvent::Loaded {
                    namespace: self.namespace.clone(),
                    items,
                });
            }
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "refresh failed");
                self.emit(SyncEvent::RefreshFailed {
                    namespace: self.namespace.clone(),
                    reason: err.to_string(),
                });
            }
        }

        self.set_state(SyncState::Ready);
    }

    fn set_state(&self, state: SyncState) {
        *self.shared.state.lock().unwrap() = state;
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine; events are best-effort.
        let _ = self.events.send(event);
    }
}
