//! Attribute-Tree Adapter: bidirectional mapping between a host's nested
//! attribute tree and the object model.
//!
//! Used when the host's extensible-data mechanism, not geometry, is being
//! exchanged. Three native shapes exist: scalar leaves (geometry leaves
//! delegate through the converter), composite "species" with named children,
//! and ordered lists. List items are serialized under `"<name>_[<index>]"`
//! member keys; reconstruction sorts by the parsed index because the host's
//! dynamic property map does not preserve write order.

pub mod schema;

pub use schema::{Definition, DefinitionId, DefinitionShape, SchemaRegistry};

use crate::convert::Converter;
use crate::error::{AttributeError, HostError};
use crate::model::{Node, Scalar, Value};
use crate::session::Diagnostic;
use std::collections::BTreeMap;
use tracing::debug;

/// Member key carrying the definition identifier on serialized composites.
pub const DEFINITION_KEY: &str = "definition_id";

/// Type tag of a serialized composite.
pub const SPECIES_TYPE: &str = "AttributeSpecies";
/// Type tag of a serialized list.
pub const LIST_TYPE: &str = "AttributeList";
/// Type tag of the top-level attribute tree node.
pub const TREE_TYPE: &str = "AttributeTree";

/// A native attribute value, parameterized by the host's entity handle for
/// geometry leaves.
#[derive(Debug, Clone)]
pub enum AttributeData<N> {
    Scalar {
        definition: DefinitionId,
        value: Scalar,
    },
    Geometry {
        definition: DefinitionId,
        value: N,
    },
    Species {
        definition: DefinitionId,
        children: Vec<AttributeData<N>>,
    },
    List {
        definition: DefinitionId,
        items: Vec<AttributeData<N>>,
    },
}

impl<N> AttributeData<N> {
    pub fn definition(&self) -> &DefinitionId {
        match self {
            AttributeData::Scalar { definition, .. }
            | AttributeData::Geometry { definition, .. }
            | AttributeData::Species { definition, .. }
            | AttributeData::List { definition, .. } => definition,
        }
    }
}

/// Host-side sink for rebuilt attribute values.
///
/// The whole batch is submitted in one call so the host can apply it
/// atomically and reject it as one unit.
pub trait AttributeSink<N> {
    fn write_batch(&mut self, batch: Vec<AttributeData<N>>) -> Result<(), HostError>;
}

/// Serialize native attribute data into a single tree node.
pub fn attributes_to_node<C: Converter>(
    data: &[AttributeData<C::Native>],
    registry: &SchemaRegistry,
    converter: &C,
) -> Result<Node, AttributeError> {
    let mut node = Node::new(TREE_TYPE);
    for entry in data {
        let definition = registry.resolve(entry.definition())?;
        let value = serialize_data(entry, registry, converter)?;
        node.set(definition.name.clone(), value)?;
    }
    Ok(node)
}

fn serialize_data<C: Converter>(
    data: &AttributeData<C::Native>,
    registry: &SchemaRegistry,
    converter: &C,
) -> Result<Value, AttributeError> {
    match data {
        AttributeData::Scalar { value, .. } => Ok(Value::Scalar(value.clone())),
        AttributeData::Geometry { value, .. } => {
            Ok(Value::Object(converter.convert_to_foreign(value)?))
        }
        AttributeData::Species { definition, children } => {
            let mut node = Node::new(SPECIES_TYPE);
            node.set(DEFINITION_KEY, definition.as_str().into())?;
            for child in children {
                let child_def = registry.resolve(child.definition())?;
                let value = serialize_data(child, registry, converter)?;
                node.set(child_def.name.clone(), value)?;
            }
            Ok(Value::Object(node))
        }
        AttributeData::List { definition, items } => {
            let list_def = registry.resolve(definition)?;
            let item_name = match &list_def.shape {
                DefinitionShape::List { item } => registry.resolve(item)?.name.clone(),
                _ => {
                    return Err(AttributeError::ShapeMismatch {
                        definition: definition.to_string(),
                        expected: "list",
                        member: list_def.name.clone(),
                    })
                }
            };
            let mut node = Node::new(LIST_TYPE);
            node.set(DEFINITION_KEY, definition.as_str().into())?;
            for (index, item) in items.iter().enumerate() {
                let value = serialize_data(item, registry, converter)?;
                node.set(format!("{item_name}_[{index}]"), value)?;
            }
            Ok(Value::Object(node))
        }
    }
}

/// Rebuild native attribute data from a tree node.
///
/// Members without a resolvable definition are skipped; list keys that fail
/// index parsing are skipped; duplicate list indices keep the last value and
/// record a diagnostic.
pub fn node_to_attributes<C: Converter>(
    node: &Node,
    registry: &SchemaRegistry,
    converter: &C,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<AttributeData<C::Native>>, AttributeError> {
    let mut batch = Vec::new();
    for (name, value) in node.members() {
        // Tree member names are definition names; members nothing defines
        // (foreign data, other applications' payloads) are skipped.
        let Some(definition) = registry.get_by_name(name) else {
            debug!(member = %name, "skipping member with no attribute definition");
            continue;
        };
        batch.push(deserialize_data(
            definition,
            value,
            registry,
            converter,
            diagnostics,
        )?);
    }
    Ok(batch)
}

/// Parse and submit a tree node as one atomic batch write.
pub fn apply_node_to_sink<C, S>(
    node: &Node,
    registry: &SchemaRegistry,
    converter: &C,
    sink: &mut S,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), AttributeError>
where
    C: Converter,
    S: AttributeSink<C::Native>,
{
    let batch = node_to_attributes(node, registry, converter, diagnostics)?;
    sink.write_batch(batch).map_err(AttributeError::from)
}

fn deserialize_data<C: Converter>(
    definition: &Definition,
    value: &Value,
    registry: &SchemaRegistry,
    converter: &C,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<AttributeData<C::Native>, AttributeError> {
    match &definition.shape {
        DefinitionShape::Scalar => match value {
            Value::Scalar(scalar) => Ok(AttributeData::Scalar {
                definition: definition.id.clone(),
                value: scalar.clone(),
            }),
            _ => Err(shape_mismatch(definition, "scalar")),
        },
        DefinitionShape::Geometry => match value {
            Value::Object(node) => Ok(AttributeData::Geometry {
                definition: definition.id.clone(),
                value: converter.convert_to_native(node)?,
            }),
            _ => Err(shape_mismatch(definition, "geometry")),
        },
        DefinitionShape::Species { children } => {
            let Value::Object(node) = value else {
                return Err(shape_mismatch(definition, "species"));
            };
            let mut parsed = Vec::new();
            for child_id in children {
                let child_def = registry.resolve(child_id)?;
                // A missing child keeps its host default.
                let Some(member) = node.get(&child_def.name) else {
                    continue;
                };
                parsed.push(deserialize_data(
                    child_def,
                    member,
                    registry,
                    converter,
                    diagnostics,
                )?);
            }
            Ok(AttributeData::Species {
                definition: definition.id.clone(),
                children: parsed,
            })
        }
        DefinitionShape::List { item } => {
            let Value::Object(node) = value else {
                return Err(shape_mismatch(definition, "list"));
            };
            let item_def = registry.resolve(item)?;

            let mut ordered: BTreeMap<usize, AttributeData<C::Native>> = BTreeMap::new();
            for (key, member) in node.members() {
                let Some(index) = parse_list_index(key, &item_def.name) else {
                    continue;
                };
                let parsed =
                    deserialize_data(item_def, member, registry, converter, diagnostics)?;
                if ordered.insert(index, parsed).is_some() {
                    diagnostics.push(Diagnostic::DuplicateListIndex {
                        member: key.clone(),
                        index,
                    });
                }
            }

            // Ascending parsed index, gaps collapsed: the host map gives no
            // ordering guarantee, the bracketed index is authoritative.
            Ok(AttributeData::List {
                definition: definition.id.clone(),
                items: ordered.into_values().collect(),
            })
        }
    }
}

/// Parse the bracketed index from a `"<name>_[<index>]"` member key.
/// Returns `None` (skip, don't fail) for keys with the wrong prefix, a
/// malformed bracket pair, or a non-numeric index.
fn parse_list_index(key: &str, item_name: &str) -> Option<usize> {
    if !key.starts_with(item_name) {
        return None;
    }
    let start = key.rfind('[')?;
    let end = key.rfind(']')?;
    if start >= end {
        return None;
    }
    key[start + 1..end].parse().ok()
}

fn shape_mismatch(definition: &Definition, expected: &'static str) -> AttributeError {
    AttributeError::ShapeMismatch {
        definition: definition.id.to_string(),
        expected,
        member: definition.name.clone(),
    }
}
