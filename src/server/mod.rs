pub mod routes;

use crate::state::SessionStore;
use crate::translation::DocumentTranslator;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub translator: Arc<DocumentTranslator>,
}

impl AppState {
    pub fn new(store: SessionStore, translator: Arc<DocumentTranslator>) -> Self {
        Self { store, translator }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/models", get(routes::models))
        .route("/translate", post(routes::start_translation))
        .route("/progress/:session_id", get(routes::progress))
        .route("/session/:session_id", delete(routes::delete_session))
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("HTTP server listening on http://{}", addr);
    tracing::info!("  GET    /health");
    tracing::info!("  GET    /models");
    tracing::info!("  POST   /translate");
    tracing::info!("  GET    /progress/:session_id");
    tracing::info!("  DELETE /session/:session_id");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
