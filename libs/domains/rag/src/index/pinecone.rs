use async_trait::async_trait;
use core_config::{env_optional, env_or_default, env_required};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::VectorIndex;
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingVector, IndexMatch};

pub const DEFAULT_INDEX_NAME: &str = "flickr8kragproject";
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_API_VERSION: &str = "2024-07";

const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";

/// Pinecone connection configuration
#[derive(Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    /// Data-plane host; resolved through the control plane when unset
    pub index_host: Option<String>,
    pub control_plane_url: String,
    pub api_version: String,
}

impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("index_host", &self.index_host)
            .field("control_plane_url", &self.control_plane_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            index_host: None,
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_index_host(mut self, host: impl Into<String>) -> Self {
        self.index_host = Some(host.into());
        self
    }

    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into();
        self
    }

    pub fn from_env() -> RagResult<Self> {
        let api_key = env_required("PINECONE_API_KEY")?;
        let index_name = env_or_default("PINECONE_INDEX_NAME", DEFAULT_INDEX_NAME);

        Ok(Self {
            api_key,
            index_name,
            index_host: env_optional("PINECONE_INDEX_HOST"),
            control_plane_url: env_or_default("PINECONE_CONTROL_PLANE_URL", DEFAULT_CONTROL_PLANE_URL),
            api_version: env_or_default("PINECONE_API_VERSION", DEFAULT_API_VERSION),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl From<PineconeMatch> for IndexMatch {
    fn from(m: PineconeMatch) -> Self {
        IndexMatch {
            id: m.id,
            score: m.score,
            metadata: m.metadata.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// Pinecone serverless index over the REST data plane.
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    api_version: String,
}

impl PineconeIndex {
    /// Build the HTTP client and resolve the data-plane host.
    pub async fn connect(config: &PineconeConfig, timeout: Duration) -> RagResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build Pinecone client: {}", e)))?;

        let host = match &config.index_host {
            Some(host) => normalize_host(host),
            None => resolve_host(&client, config).await?,
        };

        info!(index = %config.index_name, host = %host, "Pinecone index resolved");

        Ok(Self {
            client,
            host,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RagResult<reqwest::Response> {
        let url = format!("{}/{}", self.host, path);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, &self.api_version)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::IndexUnavailable(format!("Pinecone request failed: {}", e)))?;

        check_status(response.status())?;
        Ok(response)
    }
}

/// Look up the data-plane host of `config.index_name` via the control plane.
async fn resolve_host(client: &Client, config: &PineconeConfig) -> RagResult<String> {
    let url = format!(
        "{}/indexes/{}",
        config.control_plane_url.trim_end_matches('/'),
        config.index_name
    );

    let response = client
        .get(&url)
        .header(API_KEY_HEADER, &config.api_key)
        .header(API_VERSION_HEADER, &config.api_version)
        .send()
        .await
        .map_err(|e| RagError::IndexUnavailable(format!("Pinecone control plane: {}", e)))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(RagError::Config(format!(
            "Pinecone index '{}' does not exist",
            config.index_name
        )));
    }
    check_status(response.status())?;

    let described: DescribeIndexResponse = response
        .json()
        .await
        .map_err(|e| RagError::IndexUnavailable(format!("Unexpected describe_index response: {}", e)))?;

    Ok(normalize_host(&described.host))
}

fn check_status(status: StatusCode) -> RagResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RagError::IndexUnavailable(format!(
            "Pinecone returned HTTP {}",
            status
        )))
    }
}

/// Pinecone reports hosts without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self, vector), fields(backend = "pinecone"))]
    async fn query(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
        namespace: &str,
    ) -> RagResult<Vec<IndexMatch>> {
        let request = QueryRequest {
            vector: vector.as_slice(),
            top_k,
            include_metadata: true,
            include_values: false,
            namespace,
        };

        let response: QueryResponse = self
            .post("query", &request)
            .await?
            .json()
            .await
            .map_err(|e| RagError::IndexUnavailable(format!("Unexpected query response: {}", e)))?;

        debug!(matches = response.matches.len(), "Pinecone query complete");
        Ok(response.matches.into_iter().map(IndexMatch::from).collect())
    }

    async fn health_check(&self) -> RagResult<()> {
        self.post("describe_index_stats", &serde_json::json!({})).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "pinecone"
    }
}
