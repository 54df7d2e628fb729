use async_trait::async_trait;
use core_config::{env_optional, env_or_default};
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    self, Condition, Filter, PointId, ScoredPoint, SearchPointsBuilder, Value as QdrantValue,
};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use super::VectorIndex;
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingVector, IndexMatch};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "images";

/// Payload key carrying the logical namespace of each point
const NAMESPACE_KEY: &str = "namespace";

/// Qdrant connection configuration
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn from_env() -> Self {
        Self {
            url: env_or_default("QDRANT_URL", DEFAULT_QDRANT_URL),
            api_key: env_optional("QDRANT_API_KEY"),
            collection: env_or_default("QDRANT_COLLECTION", DEFAULT_COLLECTION),
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self::new(DEFAULT_QDRANT_URL)
    }
}

/// Qdrant collection queried over gRPC; namespaces are a payload filter.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    pub fn new(config: &QdrantConfig, timeout: Duration) -> RagResult<Self> {
        let mut builder = Qdrant::from_url(&config.url).timeout(timeout);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self::from_client(client, config.collection.clone()))
    }

    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

fn point_id_to_string(point_id: Option<&PointId>) -> String {
    match point_id.and_then(|id| id.point_id_options.as_ref()) {
        Some(qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(Value::Null),
        Some(Kind::BoolValue(b)) => Some(Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f).map(Value::Number),
        Some(Kind::StringValue(s)) => Some(Value::String(s)),
        Some(Kind::ListValue(list)) => Some(Value::Array(
            list.values.into_iter().filter_map(qdrant_value_to_json).collect(),
        )),
        Some(Kind::StructValue(s)) => Some(Value::Object(
            s.fields
                .into_iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|v| (k, v)))
                .collect(),
        )),
        None => None,
    }
}

fn scored_point_to_match(point: ScoredPoint) -> IndexMatch {
    let mut metadata = Map::new();
    for (key, val) in point.payload {
        if key == NAMESPACE_KEY {
            continue;
        }
        if let Some(json_val) = qdrant_value_to_json(val) {
            metadata.insert(key, json_val);
        }
    }

    IndexMatch {
        id: point_id_to_string(point.id.as_ref()),
        score: point.score,
        metadata,
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    #[instrument(skip(self, vector), fields(backend = "qdrant", collection = %self.collection))]
    async fn query(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
        namespace: &str,
    ) -> RagResult<Vec<IndexMatch>> {
        let builder =
            SearchPointsBuilder::new(&self.collection, vector.as_slice().to_vec(), top_k as u64)
                .filter(Filter::must([Condition::matches(
                    NAMESPACE_KEY,
                    namespace.to_string(),
                )]))
                .with_payload(true);

        let results = self.client.search_points(builder).await?;

        debug!(matches = results.result.len(), "Qdrant search complete");
        Ok(results.result.into_iter().map(scored_point_to_match).collect())
    }

    async fn health_check(&self) -> RagResult<()> {
        self.client.health_check().await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}
