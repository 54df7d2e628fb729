//! RAG Domain Library
//!
//! Multimodal retrieval-augmented search: a text query or an image is embedded
//! into a shared CLIP space, matched against a pre-built caption index, and the
//! retrieved captions ground an answer from a generative model.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  RagService  │  ← embed → retrieve → caption → prompt → generate
//!                 └──────┬───────┘
//!        ┌───────────┬───┴────────┬──────────────┬──────────────┐
//! ┌──────▼─────┐ ┌───▼───────┐ ┌──▼────────┐ ┌───▼──────────┐ ┌─▼──────────┐
//! │  Embedder  │ │ Captioner │ │ Retriever │ │ PromptBuilder│ │ Generator  │
//! │  (trait)   │ │  (trait)  │ │  (trait)  │ │              │ │  (trait)   │
//! └──────┬─────┘ └───┬───────┘ └──┬────────┘ └──────────────┘ └─┬──────────┘
//! ┌──────▼─────┐ ┌───▼───────┐ ┌──▼──────────┐                ┌─▼──────────┐
//! │ClipEmbedder│ │BlipCaption│ │ VectorIndex │                │ Gemini     │
//! │  (candle)  │ │  (candle) │ │Pinecone/Qdr.│                │ Generator  │
//! └────────────┘ └───────────┘ └─────────────┘                └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_rag::{
//!     BlipCaptioner, BlipConfig, ClipConfig, ClipEmbedder, GeminiGenerator, IndexConfig,
//!     IndexRetriever, PromptBuilder, PromptConfig, Query, RagContext, RagService, connect_index,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clip = ClipConfig::from_env()?;
//! let blip = BlipConfig::from_env(clip.device, clip.max_concurrency)?;
//! let index_config = IndexConfig::from_env()?;
//! let index = connect_index(&index_config).await?;
//!
//! let service = RagService::new(RagContext {
//!     embedder: Arc::new(ClipEmbedder::load(&clip)?),
//!     captioner: Arc::new(BlipCaptioner::load(&blip)?),
//!     retriever: Arc::new(IndexRetriever::new(index, index_config.namespace.clone())),
//!     prompt_builder: PromptBuilder::new(PromptConfig::from_env()),
//!     generator: Arc::new(GeminiGenerator::from_env()?),
//! });
//!
//! let result = service.search(Query::Text("a dog playing in the park".into()), Some(2)).await?;
//! println!("{}", result.answer);
//! # Ok(())
//! # }
//! ```

pub mod captioning;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod index;
pub mod inference;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod service;

// Re-export commonly used types
pub use captioning::{BlipCaptioner, BlipConfig, Captioner};
pub use embedding::{ClipConfig, ClipEmbedder, Embedder};
pub use error::{RagError, RagResult};
pub use generation::{GeminiConfig, GeminiGenerator, Generator};
pub use handlers::{RagApiDoc, SearchResponse};
pub use index::{IndexBackend, IndexConfig, VectorIndex, connect_index};
pub use inference::{DevicePreference, InferencePool, ModelSource};
pub use models::{EmbeddingVector, IndexMatch, Query, RetrievedItem, SearchResult};
pub use prompt::{PromptBuilder, PromptConfig};
pub use retrieval::{IndexRetriever, Retriever};
pub use service::{RagContext, RagService, SearchConfig};
