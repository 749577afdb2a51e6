//! Transport trait for the remote document store boundary.
//!
//! A namespace is one named slot in the remote store (e.g. one user's file)
//! holding one document as an opaque text blob, readable and overwritable
//! atomically at that granularity. Authentication, retry and rate-limiting
//! are the implementation's concern, not the core's.
//!
//! Implementations:
//! - `InMemoryTransport` (here) - for testing
//! - `GistStore` (in reconcile-gist) - GitHub Gist API over HTTP

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("remote store returned status {0}")]
    Status(u16),

    #[error("unexpected response from remote store: {0}")]
    Response(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Access to the shared remote document store.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the current text for a namespace. `None` means the namespace
    /// has never been written (treated as an empty document upstream).
    async fn get(&self, namespace: &str) -> Result<Option<String>>;

    /// Overwrite the text for a namespace.
    async fn put(&self, namespace: &str, text: &str) -> Result<()>;
}

// Allows sharing one transport between several sync clients in tests.
#[async_trait]
impl<T: Transport> Transport for std::sync::Arc<T> {
    async fn get(&self, namespace: &str) -> Result<Option<String>> {
        (**self).get(namespace).await
    }

    async fn put(&self, namespace: &str, text: &str) -> Result<()> {
        (**self).put(namespace, text).await
    }
}

#[derive(Default)]
struct TransportState {
    docs: HashMap<String, String>,
    gets: usize,
    puts: usize,
    puts_in_flight: usize,
    max_concurrent_puts: usize,
    fail_next_get: bool,
    fail_next_put: bool,
}

/// In-memory remote store for testing.
///
/// Optionally simulates network latency, scripted failures, and tracks call
/// counts plus the maximum number of concurrently in-flight writes (the sync
/// controller promises that number never exceeds one per namespace).
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
    latency: Duration,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// A transport whose `get`/`put` take `latency` to complete.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(TransportState::default()),
            latency,
        }
    }

    /// Write a namespace directly, as another (unseen) client would.
    pub fn seed(&self, namespace: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.docs.insert(namespace.to_string(), text.to_string());
    }

    /// Current stored text for a namespace.
    pub fn text(&self, namespace: &str) -> Option<String> {
        self.state.lock().unwrap().docs.get(namespace).cloned()
    }

    pub fn get_count(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub fn put_count(&self) -> usize {
        self.state.lock().unwrap().puts
    }

    pub fn max_concurrent_puts(&self) -> usize {
        self.state.lock().unwrap().max_concurrent_puts
    }

    /// Make the next `get` fail with a transport error.
    pub fn fail_next_get(&self) {
        self.state.lock().unwrap().fail_next_get = true;
    }

    /// Make the next `put` fail with a transport error.
    pub fn fail_next_put(&self) {
        self.state.lock().unwrap().fail_next_put = true;
    }

    async fn simulate_latency(&self) {
        if self.latency > Duration::ZERO {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn get(&self, namespace: &str) -> Result<Option<String>> {
        {
            let mut state = self.state.lock().unwrap();
            state.gets += 1;
            if std::mem::take(&mut state.fail_next_get) {
                return Err(TransportError::Request("injected get failure".into()));
            }
        }
        self.simulate_latency().await;
        Ok(self.state.lock().unwrap().docs.get(namespace).cloned())
    }

    async fn put(&self, namespace: &str, text: &str) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.puts += 1;
            if std::mem::take(&mut state.fail_next_put) {
                return Err(TransportError::Request("injected put failure".into()));
            }
            state.puts_in_flight += 1;
            state.max_concurrent_puts = state.max_concurrent_puts.max(state.puts_in_flight);
        }
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        state.puts_in_flight -= 1;
        state.docs.insert(namespace.to_string(), text.to_string());
        Ok(())
    }
}
