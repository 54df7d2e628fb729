//! Vector index backends.
//!
//! [`VectorIndex`] is the raw nearest-neighbour query; ordering, metadata
//! validation and logging live one level up in the retriever.

mod config;
mod pinecone;
mod qdrant;

pub use config::{IndexBackend, IndexConfig};
pub use pinecone::{PineconeConfig, PineconeIndex};
pub use qdrant::{QdrantConfig, QdrantIndex};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RagResult;
use crate::models::{EmbeddingVector, IndexMatch};

/// Nearest-neighbour query against a persisted index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` matches from `namespace`, with metadata.
    async fn query(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
        namespace: &str,
    ) -> RagResult<Vec<IndexMatch>>;

    /// Cheap reachability check used by the readiness endpoint.
    async fn health_check(&self) -> RagResult<()>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Connect to the configured backend.
pub async fn connect_index(config: &IndexConfig) -> RagResult<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match &config.backend {
        IndexBackend::Pinecone(pinecone) => {
            Arc::new(PineconeIndex::connect(pinecone, config.timeout()).await?)
        }
        IndexBackend::Qdrant(qdrant) => Arc::new(QdrantIndex::new(qdrant, config.timeout())?),
    };

    tracing::info!(
        backend = index.backend(),
        namespace = %config.namespace,
        "Vector index connected"
    );
    Ok(index)
}
