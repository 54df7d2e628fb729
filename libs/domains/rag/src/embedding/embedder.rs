use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::{EmbeddingVector, Query};

/// Maps text and image queries into one shared, unit-normalized vector space.
///
/// Both modalities must come from the same model so that a text query and an
/// image query can be compared against the same index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a query. Fails with `InvalidQueryKind` for empty text or an image
    /// without pixels.
    async fn embed(&self, query: &Query) -> RagResult<EmbeddingVector>;
}
