use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, QuantizationType,
    ScalarQuantizationBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};

use super::QdrantConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::index::VectorIndex;
use crate::models::{CollectionSpec, Durability, ScoredPoint, SearchRequest, VectorPoint};
use crate::payload::{field, Payload};

/// Qdrant-backed implementation of [`VectorIndex`]
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    pub fn new(config: &QdrantConfig) -> MemoryResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| MemoryError::Setup(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn scope_filter(scope_id: i64) -> Filter {
        Filter::must([Condition::matches(field::SCOPE_ID, scope_id)])
    }

    fn point_id_to_string(point_id: Option<PointId>) -> String {
        match point_id.and_then(|id| id.point_id_options) {
            Some(qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid,
            Some(qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        }
    }

    fn payload_to_qdrant(payload: Payload) -> HashMap<String, QdrantValue> {
        payload
            .into_iter()
            .filter_map(|(key, val)| json_to_qdrant_value(val).map(|v| (key, v)))
            .collect()
    }

    fn qdrant_to_payload(payload: HashMap<String, QdrantValue>) -> Payload {
        payload
            .into_iter()
            .filter_map(|(key, val)| qdrant_value_to_json(val).map(|v| (key, v)))
            .collect()
    }
}

fn json_to_qdrant_value(val: serde_json::Value) -> Option<QdrantValue> {
    match val {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(QdrantValue::from(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        serde_json::Value::String(s) => Some(QdrantValue::from(s)),
        // Payloads are flat; nested values are stored as their JSON text.
        other => Some(QdrantValue::from(other.to_string())),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<serde_json::Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(serde_json::Value::Null),
        Some(Kind::BoolValue(b)) => Some(serde_json::Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(serde_json::Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f).map(serde_json::Value::Number),
        Some(Kind::StringValue(s)) => Some(serde_json::Value::String(s)),
        _ => None,
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn list_collections(&self) -> MemoryResult<Vec<String>> {
        let response = self.client.list_collections().await?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> MemoryResult<()> {
        let mut builder = CreateCollectionBuilder::new(&spec.name).vectors_config(
            VectorParamsBuilder::new(spec.dimension, Distance::Cosine).on_disk(spec.on_disk),
        );

        if spec.quantization {
            builder = builder.quantization_config(
                ScalarQuantizationBuilder::default()
                    .r#type(QuantizationType::Int8.into())
                    .quantile(0.99)
                    .always_ram(true),
            );
        }

        self.client.create_collection(builder).await?;

        info!(
            collection = %spec.name,
            dimension = spec.dimension,
            on_disk = spec.on_disk,
            quantization = spec.quantization,
            "Created Qdrant collection"
        );
        Ok(())
    }

    async fn ensure_scope_index(&self, collection: &str) -> MemoryResult<()> {
        let info = self.client.collection_info(collection).await?;
        let indexed = info
            .result
            .is_some_and(|info| info.payload_schema.contains_key(field::SCOPE_ID));
        if indexed {
            return Ok(());
        }

        // Scope filters run on every search, delete and count.
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(collection, field::SCOPE_ID, FieldType::Integer)
                    .wait(true),
            )
            .await?;

        info!(collection, field = field::SCOPE_ID, "Created payload index");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
        durability: Durability,
    ) -> MemoryResult<()> {
        let count = points.len();
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| PointStruct::new(p.id.to_string(), p.vector, Self::payload_to_qdrant(p.payload)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(durability.waits()))
            .await?;

        debug!(collection, count, %durability, "Upserted points");
        Ok(())
    }

    async fn search(&self, collection: &str, request: SearchRequest) -> MemoryResult<Vec<ScoredPoint>> {
        let builder = SearchPointsBuilder::new(collection, request.vector, request.limit)
            .filter(Self::scope_filter(request.scope_id))
            .with_payload(request.with_payload);

        let response = self.client.search_points(builder).await?;

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredPoint {
                id: Self::point_id_to_string(point.id),
                score: point.score,
                payload: Self::qdrant_to_payload(point.payload),
            })
            .collect())
    }

    async fn delete_scope(&self, collection: &str, scope_id: i64) -> MemoryResult<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(Self::scope_filter(scope_id))
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    async fn count_scope(&self, collection: &str, scope_id: i64) -> MemoryResult<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(collection)
                    .filter(Self::scope_filter(scope_id))
                    .exact(true),
            )
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or_default())
    }
}
