//! Sled-backed local object cache transport.

use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::ObjectId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stored record envelope: the wire payload plus local bookkeeping that is
/// never part of the content address.
#[derive(Debug, Serialize, Deserialize)]
struct StoredObject {
    payload: Vec<u8>,
    stored_at_ms: u64,
}

/// Local disk cache backed by sled.
///
/// Used both as a standalone transport and as the fallback consulted during
/// receive before a reference is declared unresolvable.
pub struct SledTransport {
    db: sled::Db,
}

impl SledTransport {
    /// Open (or create) a cache database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let db = sled::open(path)
            .map_err(|e| TransportError::Storage(format!("failed to open sled database: {e}")))?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), TransportError> {
        self.db
            .flush()
            .map_err(|e| TransportError::Storage(format!("failed to flush database: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for SledTransport {
    fn name(&self) -> &str {
        "sled"
    }

    async fn save(&self, id: &ObjectId, payload: &[u8]) -> Result<(), TransportError> {
        let record = StoredObject {
            payload: payload.to_vec(),
            stored_at_ms: now_millis(),
        };
        let value = bincode::serialize(&record)
            .map_err(|e| TransportError::Encoding(format!("failed to serialize record: {e}")))?;
        self.db
            .insert(id.as_str().as_bytes(), value)
            .map_err(|e| TransportError::Storage(format!("failed to put object: {e}")))?;
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, TransportError> {
        match self
            .db
            .get(id.as_str().as_bytes())
            .map_err(|e| TransportError::Storage(format!("failed to get object: {e}")))?
        {
            Some(value) => {
                let record: StoredObject = bincode::deserialize(&value).map_err(|e| {
                    TransportError::Encoding(format!("failed to deserialize record: {e}"))
                })?;
                Ok(Some(record.payload))
            }
            None => Ok(None),
        }
    }

    async fn has(&self, id: &ObjectId) -> Result<bool, TransportError> {
        self.db
            .contains_key(id.as_str().as_bytes())
            .map_err(|e| TransportError::Storage(format!("failed to check object: {e}")))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
