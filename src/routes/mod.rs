//! Route modules for the drawing annotator

pub mod annotations;
pub mod documents;
pub mod health;
pub mod viewer;

use axum::{extract::DefaultBodyLimit, Router};

use crate::state::AppState;

/// Build the API router. Tracing and CORS layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_bytes;
    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1/health", health::router())
        .nest(
            "/api/v1/documents",
            documents::router()
                .merge(viewer::router())
                .merge(annotations::router()),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
