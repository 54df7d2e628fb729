use core_config::env_parse;
use observability::{RagMetrics, StageTimer};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::captioning::Captioner;
use crate::embedding::Embedder;
use crate::error::{RagError, RagResult};
use crate::generation::Generator;
use crate::models::{DEFAULT_TOP_K, Query, SearchResult};
use crate::prompt::PromptBuilder;
use crate::retrieval::Retriever;

pub const DEFAULT_MAX_TOP_K: usize = 50;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Long-lived collaborators of the search pipeline, built once at startup.
#[derive(Clone)]
pub struct RagContext {
    pub embedder: Arc<dyn Embedder>,
    pub captioner: Arc<dyn Captioner>,
    pub retriever: Arc<dyn Retriever>,
    pub prompt_builder: PromptBuilder,
    pub generator: Arc<dyn Generator>,
}

/// Request limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub max_upload_bytes: usize,
}

impl SearchConfig {
    /// Reads RAG_DEFAULT_TOP_K, RAG_MAX_TOP_K and MAX_UPLOAD_BYTES.
    pub fn from_env() -> RagResult<Self> {
        let config = Self {
            default_top_k: env_parse("RAG_DEFAULT_TOP_K", DEFAULT_TOP_K)?,
            max_top_k: env_parse("RAG_MAX_TOP_K", DEFAULT_MAX_TOP_K)?,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        };

        if config.default_top_k == 0 || config.default_top_k > config.max_top_k {
            return Err(RagError::Config(format!(
                "RAG_DEFAULT_TOP_K must be between 1 and RAG_MAX_TOP_K ({})",
                config.max_top_k
            )));
        }

        Ok(config)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            max_top_k: DEFAULT_MAX_TOP_K,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// The search orchestrator.
///
/// embed → retrieve → normalize to text → build prompt → generate. Every step
/// fails fast; nothing is retried and no partial result is returned.
pub struct RagService {
    context: RagContext,
    config: SearchConfig,
}

impl RagService {
    pub fn new(context: RagContext) -> Self {
        Self {
            context,
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Apply the default and bounds to a requested result count.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> RagResult<usize> {
        match requested {
            None => Ok(self.config.default_top_k),
            Some(0) => Err(RagError::InvalidQueryKind(
                "top_k must be at least 1".to_string(),
            )),
            Some(k) if k > self.config.max_top_k => Err(RagError::InvalidQueryKind(format!(
                "top_k must be at most {}",
                self.config.max_top_k
            ))),
            Some(k) => Ok(k),
        }
    }

    /// Answer a text or image query from the indexed collection.
    #[instrument(skip(self, query), fields(modality = query.modality()))]
    pub async fn search(&self, query: Query, top_k: Option<usize>) -> RagResult<SearchResult> {
        let modality = query.modality();
        let result = self.run(query, top_k).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.error_code().as_str(),
        };
        RagMetrics::record_search(modality, outcome);

        result
    }

    async fn run(&self, query: Query, top_k: Option<usize>) -> RagResult<SearchResult> {
        query.validate()?;
        let top_k = self.resolve_top_k(top_k)?;

        let vector = {
            let _timer = StageTimer::start("embed");
            self.context.embedder.embed(&query).await?
        };

        let items = {
            let _timer = StageTimer::start("retrieve");
            self.context.retriever.retrieve(&vector, top_k).await?
        };
        RagMetrics::record_retrieved(items.len());

        let query_text = match &query {
            Query::Text(text) => text.clone(),
            Query::Image(image) => {
                let _timer = StageTimer::start("caption");
                self.context.captioner.caption(Arc::clone(image)).await?
            }
        };

        let prompt = self.context.prompt_builder.build(&query_text, &items);

        let answer = {
            let _timer = StageTimer::start("generate");
            self.context.generator.generate(&prompt).await?
        };

        info!(top_k, retrieved = items.len(), "Search completed");

        Ok(SearchResult {
            answer,
            retrieved_items: items,
        })
    }

    /// Readiness of the request-time dependencies.
    pub async fn health_check(&self) -> RagResult<()> {
        self.context.retriever.health_check().await
    }
}
