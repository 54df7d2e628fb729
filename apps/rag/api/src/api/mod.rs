use axum::Router;

pub mod health;

pub fn routes(state: &crate::state::AppState) -> Router {
    // POST /api/search
    domain_rag::handlers::router(state.service.clone())
}

pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
