//! Application state management.
//!
//! Shared state passed to the app-level handlers: configuration and the
//! search service holding the loaded models and index connection.

use domain_rag::RagService;
use std::sync::Arc;

/// Shared application state.
///
/// Cloned per handler; the service is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// Search orchestrator with its long-lived collaborators
    pub service: Arc<RagService>,
}
