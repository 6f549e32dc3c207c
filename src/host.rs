//! Host document collaborator traits.
//!
//! The host document is a non-shareable exclusive resource: one scoped
//! transaction per operation, acquired once, held for the full duration,
//! never re-entered. Implementations live in per-host connector crates.

use crate::error::HostError;

/// Opaque key identifying a host container (layer, category, collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef(String);

impl ContainerRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scoped host transaction.
///
/// RAII contract: `commit` consumes the transaction; dropping it without
/// committing must discard all edits. Every exit path therefore either
/// commits or rolls back.
pub trait HostTransaction {
    /// Host-native entity handle accepted by this transaction.
    type Entity;

    /// Resolve a container by destination path, creating it if absent.
    fn resolve_or_create_container(&mut self, path: &str) -> Result<ContainerRef, HostError>;

    /// Bake a converted entity into a container.
    fn create_entity(
        &mut self,
        entity: Self::Entity,
        container: &ContainerRef,
    ) -> Result<(), HostError>;

    fn commit(self) -> Result<(), HostError>;
}

/// An open host document.
pub trait HostDocument {
    type Entity;
    type Transaction: HostTransaction<Entity = Self::Entity>;

    fn begin_transaction(&mut self) -> Result<Self::Transaction, HostError>;

    /// Resolve a selected-object handle to its entity and the name of the
    /// container it currently lives in. `None` when the handle no longer
    /// exists in the document.
    fn resolve_handle(&self, handle: &str) -> Option<(Self::Entity, String)>;

    fn enumerate_containers(&self) -> Vec<String>;

    /// Characters this host forbids in container names.
    fn forbidden_path_chars(&self) -> &[char];

    /// Unit system of the document, recorded on every sent commit.
    fn units(&self) -> &str;
}
