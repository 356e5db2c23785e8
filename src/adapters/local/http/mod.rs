//! HTTP inbound adapter.
//!
//! Upload form and endpoint, the client event WebSocket, and static serving
//! of processed videos.

pub mod upload;
pub mod ws;

use crate::adapters::local::events::SessionRegistry;
use crate::application::runner::JobRunner;
use crate::config::PROCESSED_ROUTE;
use crate::ports::engine::TranscodeEngine;
use crate::ports::storage::ArtifactStore;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub struct AppState<E, S> {
    pub runner: Arc<JobRunner<E, S, SessionRegistry>>,
    pub sessions: Arc<SessionRegistry>,
}

impl<E, S> Clone for AppState<E, S> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

impl<E, S> FromRef<AppState<E, S>> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState<E, S>) -> Self {
        state.sessions.clone()
    }
}

pub fn router<E, S>(state: AppState<E, S>, serve_upload_form: bool) -> Router
where
    E: TranscodeEngine + 'static,
    S: ArtifactStore + 'static,
{
    let processed = ServeDir::new(state.runner.store().output_dir());

    let mut router = Router::new()
        .route("/upload", post(upload::handle::<E, S>))
        .route("/ws", get(ws::handle))
        .nest_service(PROCESSED_ROUTE, processed);

    if serve_upload_form {
        router = router.route("/", get(upload::form::<E, S>));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
