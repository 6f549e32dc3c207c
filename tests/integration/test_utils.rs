//! Shared test utilities for integration tests
//!
//! Provides a fake converter, a fake host document, graph builders, and a
//! transport wrapper that cancels a token mid-transfer.

use async_trait::async_trait;
use skein::convert::Converter;
use skein::error::{ConversionError, HostError, TransportError};
use skein::host::{ContainerRef, HostDocument, HostTransaction};
use skein::model::{Node, Scalar, Value};
use skein::progress::CancellationToken;
use skein::transport::{MemoryTransport, Transport};
use skein::types::{ObjectId, DETACH_PREFIX};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Entity handle produced by [`FakeConverter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FakeEntity {
    pub x: f64,
}

/// Converter that handles "Point" nodes and recognizes but fails on
/// "Cursed" nodes, so partial-failure paths can be exercised.
pub struct FakeConverter;

impl Converter for FakeConverter {
    type Native = FakeEntity;

    fn can_convert_to_native(&self, node: &Node) -> bool {
        matches!(node.type_tag(), "Point" | "Cursed")
    }

    fn convert_to_native(&self, node: &Node) -> Result<FakeEntity, ConversionError> {
        if node.type_tag() == "Cursed" {
            return Err(ConversionError::Failed {
                type_tag: "Cursed".to_string(),
                message: "deliberately unconvertible".to_string(),
            });
        }
        match node.get("x") {
            Some(Value::Scalar(Scalar::Float(x))) => Ok(FakeEntity { x: *x }),
            _ => Err(ConversionError::Failed {
                type_tag: node.type_tag().to_string(),
                message: "missing x".to_string(),
            }),
        }
    }

    // Entities in the negative half-space stand in for unsupported types.
    fn can_convert_to_foreign(&self, native: &FakeEntity) -> bool {
        native.x >= 0.0
    }

    fn convert_to_foreign(&self, native: &FakeEntity) -> Result<Node, ConversionError> {
        let mut node = Node::new("Point");
        node.set("x", native.x.into())?;
        Ok(node)
    }

    fn application_name(&self) -> &str {
        "fake"
    }
}

/// Scoped transaction over [`FakeHost`]: stages entity creations and makes
/// them visible only on commit.
pub struct FakeTransaction {
    staged: Vec<(String, FakeEntity)>,
    sink: Arc<Mutex<Vec<(String, FakeEntity)>>>,
}

impl HostTransaction for FakeTransaction {
    type Entity = FakeEntity;

    fn resolve_or_create_container(&mut self, path: &str) -> Result<ContainerRef, HostError> {
        Ok(ContainerRef::new(path))
    }

    fn create_entity(
        &mut self,
        entity: FakeEntity,
        container: &ContainerRef,
    ) -> Result<(), HostError> {
        self.staged.push((container.as_str().to_string(), entity));
        Ok(())
    }

    fn commit(self) -> Result<(), HostError> {
        self.sink.lock().unwrap().extend(self.staged);
        Ok(())
    }
}

/// In-memory host document with a fixed handle table.
pub struct FakeHost {
    handles: HashMap<String, (FakeEntity, String)>,
    forbidden: Vec<char>,
    baked: Arc<Mutex<Vec<(String, FakeEntity)>>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            forbidden: vec![':', '*'],
            baked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_handle(mut self, handle: &str, x: f64, container: &str) -> Self {
        self.handles
            .insert(handle.to_string(), (FakeEntity { x }, container.to_string()));
        self
    }

    /// Entities visible in the document, committed transactions only.
    pub fn baked(&self) -> Vec<(String, FakeEntity)> {
        self.baked.lock().unwrap().clone()
    }
}

impl HostDocument for FakeHost {
    type Entity = FakeEntity;
    type Transaction = FakeTransaction;

    fn begin_transaction(&mut self) -> Result<FakeTransaction, HostError> {
        Ok(FakeTransaction {
            staged: Vec::new(),
            sink: Arc::clone(&self.baked),
        })
    }

    fn resolve_handle(&self, handle: &str) -> Option<(FakeEntity, String)> {
        self.handles.get(handle).cloned()
    }

    fn enumerate_containers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.values().map(|(_, c)| c.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    fn forbidden_path_chars(&self) -> &[char] {
        &self.forbidden
    }

    fn units(&self) -> &str {
        "meters"
    }
}

/// Build a "Point" node with one float member.
pub fn point(x: f64) -> Node {
    let mut node = Node::new("Point");
    node.set("x", x.into()).unwrap();
    node
}

/// Build a commit object holding the given nodes as a detached group under
/// `container`.
pub fn commit_of(items: Vec<Node>, container: &str) -> Node {
    let mut root = Node::new("Commit");
    root.set("units", "meters".into()).unwrap();
    root.set(
        format!("{DETACH_PREFIX}{container}"),
        Value::Sequence(items.into_iter().map(Value::Object).collect()),
    )
    .unwrap();
    root
}

/// Transport wrapper that cancels a token after a fixed number of
/// successful saves, simulating a user abort mid-transfer.
pub struct CancelAfterSaves {
    inner: MemoryTransport,
    token: CancellationToken,
    remaining: AtomicU64,
}

impl CancelAfterSaves {
    pub fn new(token: CancellationToken, saves_before_cancel: u64) -> Self {
        Self {
            inner: MemoryTransport::new(),
            token,
            remaining: AtomicU64::new(saves_before_cancel),
        }
    }

    pub fn save_call_count(&self) -> u64 {
        self.inner.save_call_count()
    }
}

#[async_trait]
impl Transport for CancelAfterSaves {
    fn name(&self) -> &str {
        "cancel-after-saves"
    }

    async fn save(&self, id: &ObjectId, payload: &[u8]) -> Result<(), TransportError> {
        self.inner.save(id, payload).await?;
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.token.cancel();
        }
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, TransportError> {
        self.inner.get(id).await
    }

    async fn has(&self, id: &ObjectId) -> Result<bool, TransportError> {
        self.inner.has(id).await
    }
}
