//! Stream metadata client: resolves stream commits to root object ids.
//!
//! Object payloads travel over [`crate::transport::Transport`]; this client
//! only answers the "which root object does this commit point at" question,
//! including the `"latest"` shorthand that follows a branch head.

use crate::error::StreamError;
use crate::types::ObjectId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Commit identifier that resolves to the most recent commit on a branch
/// instead of naming one directly.
pub const LATEST_COMMIT: &str = "latest";

/// Branch consulted when a commit reference says [`LATEST_COMMIT`] without
/// naming one.
pub const DEFAULT_BRANCH: &str = "main";

/// Metadata of one commit on a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Server-side commit identifier.
    pub id: String,
    /// Root object of the committed graph.
    pub referenced_object_id: ObjectId,
    /// Preceding commit on the same branch, absent for the first commit.
    pub parent_id: Option<String>,
}

/// Read-side commit lookup against a stream server.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Fetch one commit by id.
    async fn commit(&self, stream_id: &str, commit_id: &str) -> Result<CommitInfo, StreamError>;

    /// Fetch the newest commit on a branch.
    async fn latest_commit(
        &self,
        stream_id: &str,
        branch: &str,
    ) -> Result<CommitInfo, StreamError>;
}

/// Resolve a commit reference to the commit whose root should be received.
///
/// `"latest"` follows the head of [`DEFAULT_BRANCH`]; anything else is
/// looked up verbatim.
pub async fn resolve_received_commit(
    client: &dyn StreamClient,
    stream_id: &str,
    commit_id: &str,
) -> Result<CommitInfo, StreamError> {
    let info = if commit_id == LATEST_COMMIT {
        client.latest_commit(stream_id, DEFAULT_BRANCH).await?
    } else {
        client.commit(stream_id, commit_id).await?
    };
    debug!(
        stream = stream_id,
        commit = %info.id,
        root = %info.referenced_object_id,
        "resolved commit reference"
    );
    Ok(info)
}
