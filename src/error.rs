//! Error types for the skein synchronization engine.

use crate::types::ObjectId;
use thiserror::Error;

/// Object-model errors. Always surfaced: holding a disallowed value kind is
/// a programming error, not a recoverable condition.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid member {member:?}: {reason}")]
    InvalidMember { member: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-object conversion errors. Recorded on the session; the batch continues.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Objects of type {type_tag} are not supported")]
    Unsupported { type_tag: String },

    #[error("Failed to convert object of type {type_tag}: {message}")]
    Failed { type_tag: String, message: String },

    #[error("Model error during conversion: {0}")]
    Model(#[from] ModelError),
}

/// Transport-level errors. Fatal for the in-flight send/receive call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport authentication failed: {0}")]
    AuthFailed(String),

    #[error("Transport rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Transport request failed: {0}")]
    RequestFailed(String),

    #[error("Transport storage error: {0}")]
    Storage(String),

    #[error("Transport payload encoding error: {0}")]
    Encoding(String),

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the send/receive pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Object {0} could not be resolved from any configured transport")]
    UnresolvableReference(ObjectId),

    #[error("Malformed payload for object {id}: {reason}")]
    MalformedPayload { id: ObjectId, reason: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by host document collaborators.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host transaction failed: {0}")]
    Transaction(String),

    #[error("Could not resolve or create container {path:?}: {reason}")]
    Container { path: String, reason: String },

    #[error("Failed to bake entity: {0}")]
    Bake(String),

    #[error("Host rejected attribute batch: {0}")]
    AttributeBatch(String),
}

/// Errors raised by the attribute-tree adapter.
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("Unknown attribute definition: {0}")]
    UnknownDefinition(String),

    #[error("Definition {definition} expected {expected} data, got {member:?}")]
    ShapeMismatch {
        definition: String,
        expected: &'static str,
        member: String,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by the stream metadata client.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream {0} not found")]
    StreamNotFound(String),

    #[error("Commit {0} not found")]
    CommitNotFound(String),

    #[error("Stream request failed: {0}")]
    RequestFailed(String),
}
