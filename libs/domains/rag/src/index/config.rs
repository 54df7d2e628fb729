use core_config::{env_or_default, env_parse};
use std::time::Duration;

use super::{PineconeConfig, QdrantConfig};
use crate::error::{RagError, RagResult};
use crate::models::DEFAULT_NAMESPACE;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which index the retriever talks to, with its connection settings.
#[derive(Debug, Clone)]
pub enum IndexBackend {
    Pinecone(PineconeConfig),
    Qdrant(QdrantConfig),
}

impl IndexBackend {
    pub fn name(&self) -> &'static str {
        match self {
            IndexBackend::Pinecone(_) => "pinecone",
            IndexBackend::Qdrant(_) => "qdrant",
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub namespace: String,
    pub timeout_secs: u64,
}

impl IndexConfig {
    pub fn new(backend: IndexBackend) -> Self {
        Self {
            backend,
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reads INDEX_BACKEND (`pinecone` or `qdrant`), INDEX_NAMESPACE and
    /// INDEX_TIMEOUT_SECS, then the selected backend's own variables.
    pub fn from_env() -> RagResult<Self> {
        let backend = match env_or_default("INDEX_BACKEND", "pinecone")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "pinecone" => IndexBackend::Pinecone(PineconeConfig::from_env()?),
            "qdrant" => IndexBackend::Qdrant(QdrantConfig::from_env()),
            other => {
                return Err(RagError::Config(format!(
                    "unknown INDEX_BACKEND '{}', expected pinecone or qdrant",
                    other
                )));
            }
        };

        let namespace = env_or_default("INDEX_NAMESPACE", DEFAULT_NAMESPACE);
        let timeout_secs = env_parse("INDEX_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            backend,
            namespace,
            timeout_secs,
        })
    }
}
