use axum::{middleware, routing::get};
use axum_helpers::server::{create_production_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_rag::{
    BlipCaptioner, ClipEmbedder, GeminiGenerator, IndexRetriever, PromptBuilder, RagContext,
    RagResult, RagService, connect_index,
};
use eyre::WrapErr;
use observability::{init_metrics, metrics_handler, metrics_middleware};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    // Weight download and model construction block; keep them off the runtime threads
    info!("Loading CLIP and BLIP models");
    let (clip_config, blip_config) = (config.clip.clone(), config.blip.clone());
    let (embedder, captioner) = tokio::task::spawn_blocking(move || -> RagResult<_> {
        let embedder = ClipEmbedder::load(&clip_config)?;
        let captioner = BlipCaptioner::load(&blip_config)?;
        Ok((embedder, captioner))
    })
    .await
    .wrap_err("Model loading task panicked")?
    .wrap_err("Failed to load models")?;

    let index = connect_index(&config.index)
        .await
        .wrap_err("Failed to connect to the vector index")?;

    let generator =
        GeminiGenerator::new(config.gemini.clone()).wrap_err("Failed to create Gemini client")?;
    info!(model = generator.model(), "Gemini generator ready");

    let context = RagContext {
        embedder: Arc::new(embedder),
        captioner: Arc::new(captioner),
        retriever: Arc::new(IndexRetriever::new(index, config.index.namespace.clone())),
        prompt_builder: PromptBuilder::new(config.prompt.clone()),
        generator: Arc::new(generator),
    };
    let service = Arc::new(RagService::new(context).with_config(config.search.clone()));

    let state = AppState { config, service };
    let server_config = state.config.server.clone();

    // Build router with API routes
    let api_routes = api::routes(&state);

    // create_router adds docs/middleware to our composed routes
    let router = create_router::<openapi::ApiDoc>(api_routes, &server_config).await?;

    // Merge health endpoints into the app
    // - /health: liveness check with app name/version
    // - /ready: readiness check against the vector index
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware));

    info!("Starting RAG API with production-ready shutdown (30s timeout)");

    create_production_app(app, &server_config, Duration::from_secs(30), async move {
        info!("Shutting down: releasing models and index connection");
        drop(state);
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("RAG API shutdown complete");
    Ok(())
}
