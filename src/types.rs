//! Core identifier types shared across the interchange model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a member as a detachment boundary: the referenced subtree
/// is stored as an independent content-addressed object and the parent keeps
/// only a reference. Purely a storage concern; destination paths strip it.
pub const DETACH_PREFIX: char = '@';

/// Separator used when concatenating member names into destination paths.
pub const PATH_SEPARATOR: char = '$';

/// Content-addressed object identifier: hex-encoded BLAKE3 hash over the
/// canonical serialization of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Strip the detachment prefix from a member name, if present.
///
/// Detachment is invisible in destination paths: `@Walls` and `Walls` name
/// the same container.
pub fn strip_detach_prefix(name: &str) -> &str {
    name.strip_prefix(DETACH_PREFIX).unwrap_or(name)
}

/// Whether a member name marks a detachment boundary.
pub fn is_detached(name: &str) -> bool {
    name.starts_with(DETACH_PREFIX)
}
