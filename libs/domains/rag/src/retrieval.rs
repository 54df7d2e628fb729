use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{RagError, RagResult};
use crate::index::VectorIndex;
use crate::models::{EmbeddingVector, RetrievedItem};

/// Top-K retrieval of captioned items for an embedding.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` items ordered by descending score.
    async fn retrieve(&self, vector: &EmbeddingVector, top_k: usize) -> RagResult<Vec<RetrievedItem>>;

    async fn health_check(&self) -> RagResult<()>;
}

/// Retriever over a namespace of a [`VectorIndex`].
pub struct IndexRetriever {
    index: Arc<dyn VectorIndex>,
    namespace: String,
}

impl IndexRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, namespace: impl Into<String>) -> Self {
        Self {
            index,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    #[instrument(skip(self, vector), fields(backend = self.index.backend(), namespace = %self.namespace))]
    async fn retrieve(&self, vector: &EmbeddingVector, top_k: usize) -> RagResult<Vec<RetrievedItem>> {
        if top_k == 0 {
            return Err(RagError::InvalidQueryKind(
                "top_k must be at least 1".to_string(),
            ));
        }

        let matches = self.index.query(vector, top_k, &self.namespace).await?;

        let mut items = matches
            .into_iter()
            .map(RetrievedItem::try_from)
            .collect::<RagResult<Vec<_>>>()?;

        // Stable, so ties keep the index's order
        items.sort_by(|a, b| b.score.total_cmp(&a.score));
        items.truncate(top_k);

        for item in &items {
            debug!(score = item.score, caption = %item.caption, url = %item.source_url, "Retrieved item");
        }

        Ok(items)
    }

    async fn health_check(&self) -> RagResult<()> {
        self.index.health_check().await
    }
}
