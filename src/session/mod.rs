//! Session controller: orchestrates transport sync, flattening, conversion,
//! and host bake for one send or receive operation.
//!
//! A session is created per operation and discarded at the end; its
//! diagnostic list and progress counters are the only parts a caller
//! observes while the operation runs. Individual conversion and bake
//! failures are recorded and the batch continues; transport faults and
//! unresolved references abort the whole operation.

use crate::config::SyncConfig;
use crate::convert::Converter;
use crate::error::SyncError;
use crate::flatten::flatten;
use crate::host::{HostDocument, HostTransaction};
use crate::model::{Node, Value};
use crate::progress::{CancellationToken, ProgressCounters, STAGE_CONVERSION};
use crate::sync::{self, Completion};
use crate::transport::Transport;
use crate::types::{ObjectId, DETACH_PREFIX};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Per-object and aggregate diagnostics accumulated during an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A branch had no convertible descendant. Not fatal.
    UnsupportedBranch {
        type_tag: String,
        destination: String,
    },
    /// One leaf failed to convert; the batch continued.
    ConversionFailed {
        destination: String,
        type_tag: String,
        message: String,
    },
    /// The host rejected a container or entity; the batch continued.
    BakeFailed {
        destination: String,
        message: String,
    },
    /// A selected handle was skipped during send.
    SkippedHandle { handle: String, reason: String },
    /// Aggregate: destination paths were altered during sanitization.
    SanitizedPaths { count: u64, forbidden: String },
    /// A list member carried the same index twice; last write won.
    DuplicateListIndex { member: String, index: usize },
}

impl Diagnostic {
    /// Warnings inform the user without demoting the outcome.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::SanitizedPaths { .. } | Diagnostic::DuplicateListIndex { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnsupportedBranch { type_tag, destination } => {
                write!(f, "Receiving {type_tag} objects is not supported; branch at {destination} not baked")
            }
            Diagnostic::ConversionFailed { destination, type_tag, message } => {
                write!(f, "Failed to convert {type_tag} at {destination}: {message}")
            }
            Diagnostic::BakeFailed { destination, message } => {
                write!(f, "Failed to bake into {destination}: {message}")
            }
            Diagnostic::SkippedHandle { handle, reason } => {
                write!(f, "Skipped object {handle}: {reason}")
            }
            Diagnostic::SanitizedPaths { count, forbidden } => {
                write!(f, "Replaced forbidden characters ({forbidden}) in {count} container name(s)")
            }
            Diagnostic::DuplicateListIndex { member, index } => {
                write!(f, "Duplicate list index {index} for {member}; last value kept")
            }
        }
    }
}

/// Overall result of an operation, always reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    CompletedWithErrors,
    Cancelled,
    /// A transport fault or unresolved reference stopped the operation;
    /// the controller surfaces these as errors, callers map them here.
    Aborted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::CompletedWithErrors => "completed_with_errors",
            Outcome::Cancelled => "cancelled",
            Outcome::Aborted => "aborted",
        }
    }
}

/// What the caller gets back: counts, reasons, and the overall outcome.
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub processed: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub outcome: Outcome,
    pub root_id: Option<ObjectId>,
    /// Application the session targeted, echoed for reporting.
    pub target_application: String,
}

/// Mutable state for one send or receive operation.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub target_application: String,
    pub selected_handles: Vec<String>,
    token: CancellationToken,
    progress: ProgressCounters,
    diagnostics: Vec<Diagnostic>,
}

impl SessionState {
    pub fn new(target_application: impl Into<String>) -> Self {
        Self {
            target_application: target_application.into(),
            ..Self::default()
        }
    }

    /// Shared token; cancel it from any thread to stop the operation at the
    /// next object boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Shared counters for periodic progress reads.
    pub fn progress(&self) -> ProgressCounters {
        self.progress.clone()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn has_failures(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.is_warning())
    }
}

/// Replace forbidden characters with `-`, reporting whether anything changed.
pub fn sanitize_path(path: &str, forbidden: &[char]) -> (String, bool) {
    let clean: String = path
        .chars()
        .map(|c| if forbidden.contains(&c) { '-' } else { c })
        .collect();
    let changed = clean != path;
    (clean, changed)
}

/// Drives one host document with one converter.
pub struct SessionController<C, H> {
    converter: C,
    host: H,
    config: SyncConfig,
}

impl<C, H> SessionController<C, H>
where
    C: Converter,
    H: HostDocument<Entity = C::Native>,
{
    pub fn new(converter: C, host: H, config: SyncConfig) -> Self {
        Self {
            converter,
            host,
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Receive a commit object and bake its convertible leaves.
    ///
    /// `root_label` seeds the destination paths (the commit/layer root
    /// label). The whole bake runs inside one scoped host transaction.
    #[instrument(skip_all, fields(root_id = %root_id, root_label))]
    pub async fn receive_commit(
        &mut self,
        root_id: &ObjectId,
        root_label: &str,
        transport: Arc<dyn Transport>,
        fallback: Option<Arc<dyn Transport>>,
        session: &mut SessionState,
    ) -> Result<OperationSummary, SyncError> {
        let token = session.token.clone();
        let progress = session.progress.clone();

        let commit = match sync::receive(
            root_id,
            &transport,
            fallback.as_ref(),
            &token,
            &progress,
            self.config.transport_concurrency,
        )
        .await?
        {
            Completion::Completed(node) => node,
            Completion::Cancelled => {
                return Ok(summary(0, Some(root_id.clone()), Outcome::Cancelled, session))
            }
        };

        let root_value = Value::Object(commit);
        let leaves = flatten(
            &self.converter,
            &root_value,
            root_label,
            &mut session.diagnostics,
        );
        info!(
            application = self.converter.application_name(),
            leaves = leaves.len(),
            "flattened commit object"
        );

        let forbidden = self.host.forbidden_path_chars().to_vec();
        let mut txn = self.host.begin_transaction()?;
        let mut processed = 0u64;
        let mut sanitized = 0u64;
        let mut cancelled = false;

        for leaf in leaves {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let (destination, changed) = sanitize_path(&leaf.destination, &forbidden);
            if changed {
                sanitized += 1;
            }

            let container = match txn.resolve_or_create_container(&destination) {
                Ok(container) => container,
                Err(e) => {
                    warn!(destination = %destination, error = %e, "container creation failed");
                    session.diagnostics.push(Diagnostic::BakeFailed {
                        destination,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let native = match self.converter.convert_to_native(&leaf.node) {
                Ok(native) => native,
                Err(e) => {
                    session.diagnostics.push(Diagnostic::ConversionFailed {
                        destination,
                        type_tag: leaf.node.type_tag().to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = txn.create_entity(native, &container) {
                session.diagnostics.push(Diagnostic::BakeFailed {
                    destination,
                    message: e.to_string(),
                });
                continue;
            }

            processed += 1;
            progress.increment(STAGE_CONVERSION);
        }

        // Baked objects stay: the store is append-only and cancellation is
        // not a rollback.
        txn.commit()?;

        if sanitized > 0 {
            session.diagnostics.push(Diagnostic::SanitizedPaths {
                count: sanitized,
                forbidden: forbidden.iter().collect(),
            });
        }

        let outcome = if cancelled {
            Outcome::Cancelled
        } else if session.has_failures() {
            Outcome::CompletedWithErrors
        } else {
            Outcome::Completed
        };
        Ok(summary(processed, Some(root_id.clone()), outcome, session))
    }

    /// Convert the session's selected handles and send the assembled commit
    /// object to every transport.
    #[instrument(skip_all, fields(handles = session.selected_handles.len()))]
    pub async fn send_commit(
        &mut self,
        transports: Vec<Arc<dyn Transport>>,
        session: &mut SessionState,
    ) -> Result<OperationSummary, SyncError> {
        let token = session.token.clone();
        let progress = session.progress.clone();
        let forbidden = self.host.forbidden_path_chars().to_vec();

        let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();
        let mut converted = 0u64;
        let mut sanitized = 0u64;

        let handles = session.selected_handles.clone();
        for handle in &handles {
            if token.is_cancelled() {
                return Ok(summary(converted, None, Outcome::Cancelled, session));
            }

            let Some((entity, container)) = self.host.resolve_handle(handle) else {
                session.diagnostics.push(Diagnostic::SkippedHandle {
                    handle: handle.clone(),
                    reason: "not found in document".to_string(),
                });
                continue;
            };

            if !self.converter.can_convert_to_foreign(&entity) {
                session.diagnostics.push(Diagnostic::SkippedHandle {
                    handle: handle.clone(),
                    reason: format!(
                        "type not supported by the {} converter",
                        self.converter.application_name()
                    ),
                });
                continue;
            }

            let mut node = match self.converter.convert_to_foreign(&entity) {
                Ok(node) => node,
                Err(e) => {
                    session.diagnostics.push(Diagnostic::ConversionFailed {
                        destination: container.clone(),
                        type_tag: format!("native object {handle}"),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            node.set("application_id", handle.as_str().into())?;

            let (clean, changed) = sanitize_path(&container, &forbidden);
            if changed {
                sanitized += 1;
            }
            groups.entry(clean).or_default().push(Value::Object(node));
            converted += 1;
            progress.increment(STAGE_CONVERSION);
        }

        if sanitized > 0 {
            session.diagnostics.push(Diagnostic::SanitizedPaths {
                count: sanitized,
                forbidden: forbidden.iter().collect(),
            });
        }

        let mut root = Node::new("Commit");
        root.set("units", self.host.units().into())?;
        for (container, items) in groups {
            root.set(
                format!("{DETACH_PREFIX}{container}"),
                Value::Sequence(items),
            )?;
        }

        match sync::send(
            &root,
            &transports,
            &token,
            &progress,
            self.config.transport_concurrency,
        )
        .await?
        {
            Completion::Completed(receipt) => {
                let outcome = if session.has_failures() {
                    Outcome::CompletedWithErrors
                } else {
                    Outcome::Completed
                };
                Ok(summary(converted, Some(receipt.root_id), outcome, session))
            }
            Completion::Cancelled => Ok(summary(converted, None, Outcome::Cancelled, session)),
        }
    }
}

fn summary(
    processed: u64,
    root_id: Option<ObjectId>,
    outcome: Outcome,
    session: &SessionState,
) -> OperationSummary {
    OperationSummary {
        processed,
        diagnostics: session.diagnostics.clone(),
        outcome,
        root_id,
        target_application: session.target_application.clone(),
    }
}
