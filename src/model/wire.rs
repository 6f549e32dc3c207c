//! Canonical wire serialization for nodes.
//!
//! The wire form is JSON with sorted member keys, which makes the byte
//! serialization order-independent: two nodes with the same members produce
//! identical bytes regardless of insertion order. Detached children are
//! replaced by reference markers carrying the child's own id, so a parent's
//! canonical bytes (and therefore its id) encode the ids of its detached
//! subtrees, merkle-style.

use crate::error::ModelError;
use crate::model::{Node, Scalar, Value};
use crate::types::{is_detached, ObjectId};
use serde_json::{Map, Value as Json};

/// Reserved key carrying the node's semantic type tag.
pub const TYPE_KEY: &str = "__type";
/// Reserved key carrying the object's own id in stored payloads.
pub const ID_KEY: &str = "__id";
/// Reserved key carrying the id-to-depth closure table in stored payloads.
pub const CLOSURE_KEY: &str = "__closure";
/// Type tag of a detachment reference marker.
pub const REFERENCE_TYPE: &str = "reference";
/// Key carrying the referenced id inside a reference marker.
pub const REFERENCED_ID_KEY: &str = "referenced_id";

/// Encode a node into its wire JSON object, collecting every directly
/// detached child (including ones bubbled up from inline descendants).
pub fn encode_node(node: &Node) -> Result<(Json, Vec<Node>), ModelError> {
    let mut children = Vec::new();
    let json = encode_node_inner(node, &mut children)?;
    Ok((json, children))
}

/// Canonical byte serialization of a node, used for id computation.
///
/// serde_json's map type keeps keys sorted, so these bytes are independent
/// of member insertion order.
pub fn canonical_bytes(node: &Node) -> Result<Vec<u8>, ModelError> {
    let (json, _) = encode_node(node)?;
    Ok(serde_json::to_vec(&json)?)
}

/// Build the reference marker for a detached child id.
pub fn reference(id: &ObjectId) -> Json {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Json::String(REFERENCE_TYPE.to_string()));
    map.insert(REFERENCED_ID_KEY.to_string(), Json::String(id.as_str().to_string()));
    Json::Object(map)
}

/// Collect every referenced id in a wire payload, in encounter order.
pub fn collect_references(json: &Json, out: &mut Vec<ObjectId>) {
    match json {
        Json::Object(map) => {
            if map.get(TYPE_KEY).and_then(Json::as_str) == Some(REFERENCE_TYPE) {
                if let Some(id) = map.get(REFERENCED_ID_KEY).and_then(Json::as_str) {
                    out.push(ObjectId::from(id));
                }
                return;
            }
            for (key, value) in map {
                if key == CLOSURE_KEY {
                    continue;
                }
                collect_references(value, out);
            }
        }
        Json::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

fn encode_node_inner(node: &Node, children: &mut Vec<Node>) -> Result<Json, ModelError> {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Json::String(node.type_tag().to_string()));
    for (name, value) in node.members() {
        let encoded = encode_value(name, value, is_detached(name), children)?;
        map.insert(name.clone(), encoded);
    }
    Ok(Json::Object(map))
}

fn encode_value(
    member: &str,
    value: &Value,
    detach: bool,
    children: &mut Vec<Node>,
) -> Result<Json, ModelError> {
    match value {
        Value::Scalar(scalar) => encode_scalar(member, scalar),
        Value::Object(node) => {
            if detach {
                let id = node.id()?;
                children.push(node.clone());
                Ok(reference(&id))
            } else {
                encode_node_inner(node, children)
            }
        }
        Value::Sequence(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(encode_value(member, item, detach, children)?);
            }
            Ok(Json::Array(encoded))
        }
        Value::Mapping(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), encode_value(member, item, detach, children)?);
            }
            Ok(Json::Object(map))
        }
    }
}

fn encode_scalar(member: &str, scalar: &Scalar) -> Result<Json, ModelError> {
    match scalar {
        Scalar::Null => Ok(Json::Null),
        Scalar::Bool(b) => Ok(Json::Bool(*b)),
        Scalar::Int(i) => Ok(Json::Number((*i).into())),
        Scalar::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| ModelError::InvalidMember {
                member: member.to_string(),
                reason: format!("non-finite float {f} has no canonical form"),
            }),
        Scalar::Text(s) => Ok(Json::String(s.clone())),
    }
}
