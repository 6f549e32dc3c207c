//! Transport synchronization: content-addressed send and receive.
//!
//! Send walks detachment boundaries and persists every detached subtree to
//! all configured transports before the node that references it, so a
//! parent's id (which encodes child ids) is always resolvable once visible.
//! Receive resolves a root id and its references transitively, then rebuilds
//! the node graph. Both are cancellation-aware at object granularity and
//! report progress through named-stage counters.

use crate::error::{ModelError, SyncError, TransportError};
use crate::model::wire::{
    self, CLOSURE_KEY, ID_KEY, REFERENCED_ID_KEY, REFERENCE_TYPE, TYPE_KEY,
};
use crate::model::{Node, Scalar, Value};
use crate::progress::{CancellationToken, ProgressCounters, STAGE_DOWNLOAD, STAGE_UPLOAD};
use crate::transport::Transport;
use crate::types::ObjectId;
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of a completed send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub root_id: ObjectId,
    /// Objects newly written to at least one transport.
    pub saved: u64,
    /// Objects every transport already had (dedup hits).
    pub skipped: u64,
}

/// Outcome of a cancellable operation: distinct from both success and
/// failure. Partially transferred data is inert; the content-addressed
/// store is append-only and safe to abandon.
#[derive(Debug)]
pub enum Completion<T> {
    Completed(T),
    Cancelled,
}

impl<T> Completion<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }
}

/// A detached object ready for transport: its id, stored payload, and height
/// above the leaf layer (used to order saves children-before-parent).
#[derive(Debug, Clone)]
struct CollectedObject {
    id: ObjectId,
    payload: Vec<u8>,
    height: usize,
}

enum SaveOutcome {
    Persisted,
    Skipped,
    Cancelled,
}

/// Send a root node to every configured transport.
///
/// Dedup is per transport via `has(id)`; progress counts saved plus skipped
/// objects under the `upload` stage. Sibling objects at the same height are
/// written with bounded concurrency; a parent is never written before all of
/// its detached children.
#[instrument(skip_all, fields(transports = transports.len()))]
pub async fn send(
    root: &Node,
    transports: &[Arc<dyn Transport>],
    token: &CancellationToken,
    progress: &ProgressCounters,
    concurrency: usize,
) -> Result<Completion<SendReceipt>, SyncError> {
    if transports.is_empty() {
        return Err(SyncError::Transport(TransportError::RequestFailed(
            "no transports configured".to_string(),
        )));
    }

    let root_id = root.id()?;
    let objects = collect_objects(root)?;
    progress.set_known_total(objects.len() as u64);
    debug!(root_id = %root_id, objects = objects.len(), "collected objects for send");

    let mut buckets: BTreeMap<usize, Vec<CollectedObject>> = BTreeMap::new();
    for object in objects {
        buckets.entry(object.height).or_default().push(object);
    }

    let saved = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);

    // Leaves first: ascending height guarantees children-before-parent.
    for (_, bucket) in buckets {
        if token.is_cancelled() {
            info!(root_id = %root_id, "send cancelled between object batches");
            return Ok(Completion::Cancelled);
        }
        let outcomes: Vec<SaveOutcome> = stream::iter(bucket)
            .map(|object| save_object(object, transports, token, progress, &saved, &skipped))
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;
        if outcomes.iter().any(|o| matches!(o, SaveOutcome::Cancelled)) {
            info!(root_id = %root_id, "send cancelled before issuing further saves");
            return Ok(Completion::Cancelled);
        }
    }

    let receipt = SendReceipt {
        root_id,
        saved: saved.load(Ordering::SeqCst),
        skipped: skipped.load(Ordering::SeqCst),
    };
    info!(root_id = %receipt.root_id, saved = receipt.saved, skipped = receipt.skipped, "send completed");
    Ok(Completion::Completed(receipt))
}

async fn save_object(
    object: CollectedObject,
    transports: &[Arc<dyn Transport>],
    token: &CancellationToken,
    progress: &ProgressCounters,
    saved: &AtomicU64,
    skipped: &AtomicU64,
) -> Result<SaveOutcome, SyncError> {
    // Checked between objects, never mid-object.
    if token.is_cancelled() {
        return Ok(SaveOutcome::Cancelled);
    }

    let mut fresh = false;
    for transport in transports {
        if transport.has(&object.id).await? {
            continue;
        }
        transport.save(&object.id, &object.payload).await?;
        fresh = true;
    }

    if fresh {
        saved.fetch_add(1, Ordering::SeqCst);
    } else {
        skipped.fetch_add(1, Ordering::SeqCst);
    }
    progress.increment(STAGE_UPLOAD);
    Ok(if fresh {
        SaveOutcome::Persisted
    } else {
        SaveOutcome::Skipped
    })
}

/// Resolve a root id and every transitively referenced object, then rebuild
/// the node graph.
///
/// The total object count is reported as soon as the root's closure table is
/// read. An optional local-cache fallback is consulted before a reference is
/// declared unresolvable. Any missing reference fails the whole receive: the
/// graph would be incomplete.
#[instrument(skip_all, fields(root_id = %root_id))]
pub async fn receive(
    root_id: &ObjectId,
    transport: &Arc<dyn Transport>,
    fallback: Option<&Arc<dyn Transport>>,
    token: &CancellationToken,
    progress: &ProgressCounters,
    concurrency: usize,
) -> Result<Completion<Node>, SyncError> {
    let root_json = fetch_required(root_id, transport, fallback, progress).await?;

    let closure_size = root_json
        .get(CLOSURE_KEY)
        .and_then(Json::as_object)
        .map(|c| c.len() as u64)
        .unwrap_or(0);
    progress.set_known_total(closure_size + 1);
    debug!(total = closure_size + 1, "receive total known");

    let mut payloads: HashMap<ObjectId, Json> = HashMap::new();
    let mut requested: HashSet<ObjectId> = HashSet::new();
    requested.insert(root_id.clone());

    let mut frontier = new_references(&root_json, &requested);
    requested.extend(frontier.iter().cloned());
    payloads.insert(root_id.clone(), root_json);

    while !frontier.is_empty() {
        if token.is_cancelled() {
            info!("receive cancelled between object batches");
            return Ok(Completion::Cancelled);
        }

        let fetched: Vec<(ObjectId, Json)> = stream::iter(frontier.drain(..))
            .map(|id| async move {
                let json = fetch_required(&id, transport, fallback, progress).await?;
                Ok::<_, SyncError>((id, json))
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        for (id, json) in fetched {
            let next = new_references(&json, &requested);
            requested.extend(next.iter().cloned());
            frontier.extend(next);
            payloads.insert(id, json);
        }
    }

    let mut decoder = GraphDecoder {
        payloads: &payloads,
        memo: HashMap::new(),
    };
    let node = decoder.decode(root_id)?;
    info!(objects = payloads.len(), "receive completed");
    Ok(Completion::Completed(node))
}

async fn fetch_required(
    id: &ObjectId,
    transport: &Arc<dyn Transport>,
    fallback: Option<&Arc<dyn Transport>>,
    progress: &ProgressCounters,
) -> Result<Json, SyncError> {
    let mut payload = transport.get(id).await?;
    if payload.is_none() {
        if let Some(fallback) = fallback {
            payload = fallback.get(id).await?;
        }
    }
    let payload = payload.ok_or_else(|| SyncError::UnresolvableReference(id.clone()))?;
    let json: Json = serde_json::from_slice(&payload).map_err(|e| SyncError::MalformedPayload {
        id: id.clone(),
        reason: e.to_string(),
    })?;
    progress.increment(STAGE_DOWNLOAD);
    Ok(json)
}

fn new_references(json: &Json, requested: &HashSet<ObjectId>) -> Vec<ObjectId> {
    let mut refs = Vec::new();
    wire::collect_references(json, &mut refs);
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|id| !requested.contains(id) && seen.insert(id.clone()))
        .collect()
}

/// Collect every detached object reachable from the root, deduplicated by
/// id, each with its stored payload (wire form plus `__id` and `__closure`)
/// and its height above the leaf layer.
fn collect_objects(root: &Node) -> Result<Vec<CollectedObject>, ModelError> {
    let mut acc: IndexMap<ObjectId, CollectedObject> = IndexMap::new();
    let mut memo: HashMap<ObjectId, (usize, BTreeMap<String, u32>)> = HashMap::new();
    collect_into(root, &mut acc, &mut memo)?;
    Ok(acc.into_iter().map(|(_, object)| object).collect())
}

fn collect_into(
    node: &Node,
    acc: &mut IndexMap<ObjectId, CollectedObject>,
    memo: &mut HashMap<ObjectId, (usize, BTreeMap<String, u32>)>,
) -> Result<(usize, BTreeMap<String, u32>), ModelError> {
    let id = node.id()?;
    if let Some(entry) = memo.get(&id) {
        return Ok(entry.clone());
    }

    let (json, children) = wire::encode_node(node)?;

    let mut closure: BTreeMap<String, u32> = BTreeMap::new();
    let mut height = 0;
    let mut seen = HashSet::new();
    for child in children {
        let child_id = child.id()?;
        if !seen.insert(child_id.clone()) {
            continue;
        }
        let (child_height, child_closure) = collect_into(&child, acc, memo)?;
        height = height.max(child_height + 1);
        // Keep the minimum depth when the same id is reachable on several
        // paths.
        for (descendant, depth) in child_closure {
            closure
                .entry(descendant)
                .and_modify(|d| *d = (*d).min(depth + 1))
                .or_insert(depth + 1);
        }
        closure
            .entry(child_id.as_str().to_string())
            .and_modify(|d| *d = (*d).min(1))
            .or_insert(1);
    }

    let mut map = match json {
        Json::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(ID_KEY.to_string(), Json::String(id.as_str().to_string()));
    if !closure.is_empty() {
        let closure_json: Map<String, Json> = closure
            .iter()
            .map(|(k, v)| (k.clone(), Json::Number((*v).into())))
            .collect();
        map.insert(CLOSURE_KEY.to_string(), Json::Object(closure_json));
    }
    let payload = serde_json::to_vec(&Json::Object(map))?;

    acc.insert(
        id.clone(),
        CollectedObject {
            id: id.clone(),
            payload,
            height,
        },
    );
    memo.insert(id, (height, closure.clone()));
    Ok((height, closure))
}

/// Rebuilds nodes from fetched payloads, memoized so a subtree shared by
/// several parents is decoded once.
struct GraphDecoder<'a> {
    payloads: &'a HashMap<ObjectId, Json>,
    memo: HashMap<ObjectId, Node>,
}

impl GraphDecoder<'_> {
    fn decode(&mut self, id: &ObjectId) -> Result<Node, SyncError> {
        if let Some(node) = self.memo.get(id) {
            return Ok(node.clone());
        }
        let json = self
            .payloads
            .get(id)
            .ok_or_else(|| SyncError::UnresolvableReference(id.clone()))?
            .clone();
        let node = self.decode_node(id, &json)?;
        self.memo.insert(id.clone(), node.clone());
        Ok(node)
    }

    fn decode_node(&mut self, context: &ObjectId, json: &Json) -> Result<Node, SyncError> {
        let map = json
            .as_object()
            .ok_or_else(|| malformed(context, "node payload is not an object"))?;
        let type_tag = map
            .get(TYPE_KEY)
            .and_then(Json::as_str)
            .ok_or_else(|| malformed(context, "node payload missing type tag"))?;

        let mut node = Node::new(type_tag);
        for (key, value) in map {
            if key == TYPE_KEY || key == ID_KEY || key == CLOSURE_KEY {
                continue;
            }
            let decoded = self.decode_value(context, value)?;
            node.set(key.clone(), decoded)?;
        }
        Ok(node)
    }

    fn decode_value(&mut self, context: &ObjectId, json: &Json) -> Result<Value, SyncError> {
        match json {
            Json::Null => Ok(Value::Scalar(Scalar::Null)),
            Json::Bool(b) => Ok(Value::Scalar(Scalar::Bool(*b))),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Scalar(Scalar::Int(i)))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Scalar(Scalar::Float(f)))
                } else {
                    Err(malformed(context, "unrepresentable number"))
                }
            }
            Json::String(s) => Ok(Value::Scalar(Scalar::Text(s.clone()))),
            Json::Array(items) => {
                let mut decoded = Vec::with_capacity(items.len());
                for item in items {
                    decoded.push(self.decode_value(context, item)?);
                }
                Ok(Value::Sequence(decoded))
            }
            Json::Object(map) => match map.get(TYPE_KEY).and_then(Json::as_str) {
                Some(REFERENCE_TYPE) => {
                    let id = map
                        .get(REFERENCED_ID_KEY)
                        .and_then(Json::as_str)
                        .ok_or_else(|| malformed(context, "reference missing id"))?;
                    Ok(Value::Object(self.decode(&ObjectId::from(id))?))
                }
                Some(_) => Ok(Value::Object(self.decode_node(context, json)?)),
                None => {
                    let mut entries = IndexMap::new();
                    for (key, value) in map {
                        entries.insert(key.clone(), self.decode_value(context, value)?);
                    }
                    Ok(Value::Mapping(entries))
                }
            },
        }
    }
}

fn malformed(id: &ObjectId, reason: &str) -> SyncError {
    SyncError::MalformedPayload {
        id: id.clone(),
        reason: reason.to_string(),
    }
}
