//! Object Model: the canonical hierarchical data unit of the interchange model.
//!
//! A [`Node`] is a typed record with an open, insertion-ordered member map.
//! Values are a closed tagged variant; dispatch is explicit pattern matching,
//! never runtime type probing. Identity is a deterministic content hash over
//! the canonical wire serialization (see [`id`] and [`wire`]).

pub mod id;
pub mod wire;

use crate::error::ModelError;
use crate::types::ObjectId;
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Primitive scalar payloads permitted as member values.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A member value: scalar, nested node, ordered sequence, or mapping.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(Scalar),
    Object(Node),
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
}

/// The canonical interchange unit: a type tag plus a dynamic member map.
///
/// Nodes are constructed by conversion (native to model) or deserialization
/// (model fetched from a transport). The id is computed lazily and cached;
/// any member mutation invalidates the cache.
#[derive(Debug, Clone)]
pub struct Node {
    type_tag: String,
    members: IndexMap<String, Value>,
    cached_id: OnceLock<ObjectId>,
}

impl Node {
    /// Create an empty node with the given semantic type tag.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            members: IndexMap::new(),
            cached_id: OnceLock::new(),
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Member map in insertion order. Order is semantically irrelevant except
    /// where a name encodes positional information (`name_[index]`).
    pub fn members(&self) -> &IndexMap<String, Value> {
        &self.members
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    /// Set a member, validating the value and invalidating the cached id.
    ///
    /// Names reserved by the wire format (`__type`, `__id`, `__closure`)
    /// are rejected: storing them would collide with the serializer's own
    /// bookkeeping and corrupt the member in transit.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<(), ModelError> {
        let name = name.into();
        validate_member_key(&name, &name)?;
        validate_value(&name, &value)?;
        self.members.insert(name, value);
        self.cached_id = OnceLock::new();
        Ok(())
    }

    /// Remove a member, invalidating the cached id if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let removed = self.members.shift_remove(name);
        if removed.is_some() {
            self.cached_id = OnceLock::new();
        }
        removed
    }

    /// Content-addressed identity: BLAKE3 over the canonical serialization,
    /// with detached children represented by their own ids so a parent id
    /// encodes the ids of its detached subtrees.
    ///
    /// Computed lazily and cached until the next member mutation. Equal
    /// content always yields an equal id, independent of member insertion
    /// order and platform.
    pub fn id(&self) -> Result<ObjectId, ModelError> {
        if let Some(cached) = self.cached_id.get() {
            return Ok(cached.clone());
        }
        let computed = id::compute_node_id(self)?;
        Ok(self.cached_id.get_or_init(|| computed).clone())
    }
}

/// Equality is defined purely by id.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Reject keys the wire format claims for itself. A mapping entry or member
/// named `__type` would be reinterpreted as a node on decode; `__id` and
/// `__closure` would be overwritten by stored-payload bookkeeping.
fn validate_member_key(member: &str, key: &str) -> Result<(), ModelError> {
    if key == wire::TYPE_KEY || key == wire::ID_KEY || key == wire::CLOSURE_KEY {
        return Err(ModelError::InvalidMember {
            member: member.to_string(),
            reason: format!("key {key:?} is reserved by the wire format"),
        });
    }
    Ok(())
}

fn validate_value(member: &str, value: &Value) -> Result<(), ModelError> {
    match value {
        Value::Scalar(Scalar::Float(f)) if !f.is_finite() => Err(ModelError::InvalidMember {
            member: member.to_string(),
            reason: format!("non-finite float {f} has no canonical form"),
        }),
        Value::Scalar(_) | Value::Object(_) => Ok(()),
        Value::Sequence(items) => {
            for item in items {
                validate_value(member, item)?;
            }
            Ok(())
        }
        Value::Mapping(map) => {
            for (key, item) in map {
                validate_member_key(member, key)?;
                validate_value(member, item)?;
            }
            Ok(())
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Text(v))
    }
}

impl From<Node> for Value {
    fn from(v: Node) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}
