//! Converter dispatcher contract.
//!
//! One implementation per host application. The core depends only on this
//! trait: the flattener queries the capability predicates, and the session
//! controller drives the conversion functions inside a scoped host
//! transaction.

use crate::error::ConversionError;
use crate::model::Node;

/// Capability and transformation surface between the object model and one
/// host application's native entities.
///
/// Both `can_convert_*` predicates must be pure and side-effect free. The
/// conversion functions may allocate host entities and must therefore be
/// invoked inside a caller-provided scoped transaction; a conversion failure
/// is caught by the caller and recorded, never allowed to abort the batch.
pub trait Converter {
    /// Host-native entity handle produced and consumed by this converter.
    type Native;

    fn can_convert_to_native(&self, node: &Node) -> bool;

    fn convert_to_native(&self, node: &Node) -> Result<Self::Native, ConversionError>;

    fn can_convert_to_foreign(&self, native: &Self::Native) -> bool;

    fn convert_to_foreign(&self, native: &Self::Native) -> Result<Node, ConversionError>;

    /// Name of the host application this converter targets.
    fn application_name(&self) -> &str;
}
