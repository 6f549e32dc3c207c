//! Attribute schema definitions and the explicit registry used to look them
//! up during deserialization.

use crate::error::AttributeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of an attribute definition, carried on serialized data
/// so the reverse mapping can find its schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(String);

impl DefinitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DefinitionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Shape of the value a definition describes.
#[derive(Debug, Clone)]
pub enum DefinitionShape {
    /// Plain scalar leaf.
    Scalar,
    /// Geometry leaf, exchanged through the converter.
    Geometry,
    /// Composite with named children, each carrying its own definition.
    Species { children: Vec<DefinitionId> },
    /// Ordered list of homogeneous items.
    List { item: DefinitionId },
}

/// One attribute definition: identity, display name, shape.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: DefinitionId,
    pub name: String,
    pub shape: DefinitionShape,
}

/// Immutable definition lookup, passed explicitly into the adapter rather
/// than living in a process-wide singleton.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    definitions: HashMap<DefinitionId, Definition>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: Definition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &DefinitionId) -> Option<&Definition> {
        self.definitions.get(id)
    }

    /// Look up a definition by display name, the key used for tree members.
    pub fn get_by_name(&self, name: &str) -> Option<&Definition> {
        self.definitions.values().find(|d| d.name == name)
    }

    pub fn resolve(&self, id: &DefinitionId) -> Result<&Definition, AttributeError> {
        self.get(id)
            .ok_or_else(|| AttributeError::UnknownDefinition(id.to_string()))
    }
}
