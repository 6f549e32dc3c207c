//! Content-addressed transport backends.
//!
//! A transport stores opaque wire payloads keyed by object id. The store is
//! append-only: a given id always resolves to bit-identical content within
//! one transport boundary, which is what makes abandoning a partial transfer
//! safe.

pub mod disk;
pub mod server;

pub use disk::SledTransport;
pub use server::ServerTransport;

use crate::error::TransportError;
use crate::types::ObjectId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Content-addressed store/fetch backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Store a payload under its id. Saving an id that already exists must
    /// be a no-op with identical content.
    async fn save(&self, id: &ObjectId, payload: &[u8]) -> Result<(), TransportError>;

    /// Fetch a payload, `None` if the id is absent.
    async fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, TransportError>;

    /// Whether the id is already present, without fetching the payload.
    async fn has(&self, id: &ObjectId) -> Result<bool, TransportError>;
}

/// In-memory transport.
///
/// Backs unit and integration tests; the save-call counter lets dedup and
/// cancellation behavior be asserted exactly.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    objects: Mutex<HashMap<ObjectId, Vec<u8>>>,
    save_calls: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls issued against this transport.
    pub fn save_call_count(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Drop an object. Test hook for simulating an incomplete store.
    pub fn remove(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.objects.lock().remove(id)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, id: &ObjectId, payload: &[u8]) -> Result<(), TransportError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(id.clone(), payload.to_vec());
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.objects.lock().get(id).cloned())
    }

    async fn has(&self, id: &ObjectId) -> Result<bool, TransportError> {
        Ok(self.objects.lock().contains_key(id))
    }
}
