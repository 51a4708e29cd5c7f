#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain_memory::payload::field;
use domain_memory::{
    CollectionSpec, Durability, EmbeddingProvider, MemoryError, MemoryResult, Payload, ScoredPoint,
    SearchRequest, VectorIndex, VectorPoint,
};
use serde_json::json;

pub const DIMENSION: usize = 16;

/// Texts containing this marker make the embedder fail.
pub const FAIL_MARKER: &str = "[fail]";
/// Texts containing this marker embed to an empty vector.
pub const EMPTY_MARKER: &str = "[empty]";

/// A call observed by the test doubles, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// An embedding request started.
    Embed,
    /// An upsert of this many points completed.
    Upsert(usize),
}

/// Call order shared between an index and an embedder.
pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Default)]
struct IndexState {
    collections: BTreeMap<String, usize>,
    scope_indexed: HashSet<String>,
    failing_scope_index: usize,
    points: BTreeMap<String, (Vec<f32>, Payload)>,
    upserts: Vec<(usize, Durability)>,
    failing_upserts: HashSet<usize>,
}

/// Exact cosine index held in memory.
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    state: Arc<Mutex<IndexState>>,
    log: CallLog,
}

impl InMemoryIndex {
    /// Record completed upserts into `log`.
    pub fn with_log(log: CallLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    /// Make the next `n` scope index requests fail.
    pub fn fail_scope_index(&self, n: usize) {
        self.state.lock().unwrap().failing_scope_index = n;
    }

    pub fn has_scope_index(&self, collection: &str) -> bool {
        self.state.lock().unwrap().scope_indexed.contains(collection)
    }

    /// Make the `n`th upsert call (1-based) fail.
    pub fn fail_upsert(&self, n: usize) {
        self.state.lock().unwrap().failing_upserts.insert(n);
    }

    /// Size and durability of every upsert call, in order.
    pub fn upserts(&self) -> Vec<(usize, Durability)> {
        self.state.lock().unwrap().upserts.clone()
    }

    pub fn point_count(&self) -> usize {
        self.state.lock().unwrap().points.len()
    }

    pub fn dimension_of(&self, collection: &str) -> Option<usize> {
        self.state.lock().unwrap().collections.get(collection).copied()
    }

    /// Every stored payload, keyed by point id.
    pub fn payloads(&self) -> BTreeMap<String, Payload> {
        self.state
            .lock()
            .unwrap()
            .points
            .iter()
            .map(|(id, (_, payload))| (id.clone(), payload.clone()))
            .collect()
    }

    /// Store a point with an arbitrary payload, bypassing the store.
    pub fn insert_raw(&self, id: &str, vector: Vec<f32>, payload: Payload) {
        self.state.lock().unwrap().points.insert(id.to_string(), (vector, payload));
    }
}

fn scope_of(payload: &Payload) -> Option<i64> {
    payload.get(field::SCOPE_ID).and_then(|v| v.as_i64())
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_collections(&self) -> MemoryResult<Vec<String>> {
        Ok(self.state.lock().unwrap().collections.keys().cloned().collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> MemoryResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.collections.contains_key(&spec.name) {
            return Err(MemoryError::Index(format!("collection {} already exists", spec.name)));
        }
        state.collections.insert(spec.name.clone(), spec.dimension as usize);
        Ok(())
    }

    async fn ensure_scope_index(&self, collection: &str) -> MemoryResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.collections.contains_key(collection) {
            return Err(MemoryError::Index(format!("collection {collection} not found")));
        }
        if state.failing_scope_index > 0 {
            state.failing_scope_index -= 1;
            return Err(MemoryError::Index("payload index rejected".into()));
        }
        state.scope_indexed.insert(collection.to_string());
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>, durability: Durability) -> MemoryResult<()> {
        let size = points.len();
        let mut state = self.state.lock().unwrap();
        state.upserts.push((size, durability));
        let call = state.upserts.len();
        if state.failing_upserts.contains(&call) {
            return Err(MemoryError::Index(format!("upsert #{call} rejected")));
        }

        let dimension = state.collections.get(collection).copied();
        for point in points {
            if Some(point.vector.len()) != dimension {
                return Err(MemoryError::Index("wrong vector dimension".into()));
            }
            state.points.insert(point.id.to_string(), (point.vector, point.payload));
        }
        self.log.lock().unwrap().push(Call::Upsert(size));
        Ok(())
    }

    async fn search(&self, _collection: &str, request: SearchRequest) -> MemoryResult<Vec<ScoredPoint>> {
        let state = self.state.lock().unwrap();
        let mut hits: Vec<ScoredPoint> = state
            .points
            .iter()
            .filter(|(_, (_, payload))| scope_of(payload) == Some(request.scope_id))
            .map(|(id, (vector, payload))| ScoredPoint {
                id: id.clone(),
                score: cosine(vector, &request.vector),
                payload: if request.with_payload { payload.clone() } else { Payload::new() },
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.limit as usize);
        Ok(hits)
    }

    async fn delete_scope(&self, _collection: &str, scope_id: i64) -> MemoryResult<()> {
        self.state
            .lock()
            .unwrap()
            .points
            .retain(|_, (_, payload)| scope_of(payload) != Some(scope_id));
        Ok(())
    }

    async fn count_scope(&self, _collection: &str, scope_id: i64) -> MemoryResult<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .points
            .values()
            .filter(|(_, payload)| scope_of(payload) == Some(scope_id))
            .count() as u64)
    }
}

/// Deterministic bag-of-words embedder that tracks its own concurrency.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    log: CallLog,
}

impl HashEmbedder {
    /// Record started embedding requests into `log`.
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text.split_whitespace() {
            let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Call::Embed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        texts
            .iter()
            .map(|text| {
                if text.contains(FAIL_MARKER) {
                    Err(MemoryError::Provider {
                        status: 400,
                        message: "content rejected".into(),
                    })
                } else if text.contains(EMPTY_MARKER) {
                    Ok(Vec::new())
                } else {
                    Ok(Self::vector(text))
                }
            })
            .collect()
    }
}

/// One export element in the import file format.
pub fn export_record(record_id: i64, text: &str) -> serde_json::Value {
    json!({
        "id": record_id,
        "text": text,
        "date": 1_700_000_000 + record_id,
        "sender_id": 1000 + record_id % 3,
        "sender_name": format!("user{}", record_id % 3),
    })
}

/// Serialize export elements into an import file body.
pub fn export(records: &[serde_json::Value]) -> String {
    serde_json::to_string_pretty(records).unwrap()
}

/// `count` valid export elements with ids `1..=count`.
pub fn valid_export(count: i64) -> Vec<serde_json::Value> {
    (1..=count)
        .map(|id| export_record(id, &format!("message number {id} about topic {}", id % 7)))
        .collect()
}
