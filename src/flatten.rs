//! Flattener: decomposes an object graph into convertible leaves with their
//! destination paths.
//!
//! The walk is depth-first and order-preserving with respect to sequence and
//! member order. Recursion stops at the first convertible node on a branch,
//! so the converter decides the granularity. Branches with no convertible
//! descendant are recorded as non-fatal diagnostics, never dropped silently.

use crate::convert::Converter;
use crate::model::{Node, Value};
use crate::session::Diagnostic;
use crate::types::{strip_detach_prefix, PATH_SEPARATOR};
use tracing::trace;

/// A convertible leaf paired with the host container path it should bake to.
#[derive(Debug, Clone)]
pub struct FlatLeaf {
    pub node: Node,
    pub destination: String,
}

/// Flatten a root value into an ordered list of convertible leaves.
///
/// `root_path` is the commit/layer root label; nested member names extend it
/// with [`PATH_SEPARATOR`], detach prefixes stripped. Sequences and mappings
/// pass the current path through unchanged, so siblings share a destination.
pub fn flatten<C: Converter>(
    converter: &C,
    value: &Value,
    root_path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<FlatLeaf> {
    let mut leaves = Vec::new();
    flatten_into(converter, value, root_path, diagnostics, &mut leaves);
    leaves
}

fn flatten_into<C: Converter>(
    converter: &C,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
    leaves: &mut Vec<FlatLeaf>,
) {
    match value {
        Value::Object(node) => {
            if converter.can_convert_to_native(node) {
                trace!(type_tag = node.type_tag(), destination = path, "emitting leaf");
                leaves.push(FlatLeaf {
                    node: node.clone(),
                    destination: path.to_string(),
                });
                return;
            }

            if node.members().is_empty() {
                // Terminal node nothing can convert: record, don't fail.
                diagnostics.push(Diagnostic::UnsupportedBranch {
                    type_tag: node.type_tag().to_string(),
                    destination: path.to_string(),
                });
                return;
            }

            for (name, member) in node.members() {
                let child_path =
                    format!("{path}{PATH_SEPARATOR}{}", strip_detach_prefix(name));
                flatten_into(converter, member, &child_path, diagnostics, leaves);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                flatten_into(converter, item, path, diagnostics, leaves);
            }
        }
        Value::Mapping(entries) => {
            for item in entries.values() {
                flatten_into(converter, item, path, diagnostics, leaves);
            }
        }
        Value::Scalar(_) => {}
    }
}
