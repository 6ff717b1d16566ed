//! Annotation Routes
//!
//! Endpoints:
//! - GET /api/v1/documents/:id/pages/:page/annotations - Layer contents
//! - PUT /api/v1/documents/:id/pages/:page/annotations/selection - Select or clear
//! - DELETE /api/v1/documents/:id/pages/:page/annotations/:aid - Remove one annotation
//! - POST /api/v1/documents/:id/pages/:page/annotations/detect-tables - Append detected tables
//! - POST /api/v1/documents/:id/pages/:page/annotations/process - Extract every pending annotation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::{process_pending, Annotation, AnnotationId, BatchSummary};
use crate::document::SessionError;
use crate::error::Result;
use crate::state::AppState;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/pages/:page/annotations", get(list_annotations))
        .route("/:id/pages/:page/annotations/selection", put(select_annotation))
        .route("/:id/pages/:page/annotations/detect-tables", post(detect_tables))
        .route("/:id/pages/:page/annotations/process", post(process_annotations))
        .route("/:id/pages/:page/annotations/:aid", delete(delete_annotation))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationList {
    pub page: u32,
    pub selected: Option<AnnotationId>,
    pub annotations: Vec<Annotation>,
}

/// GET /api/v1/documents/:id/pages/:page/annotations
async fn list_annotations(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<AnnotationList>> {
    let session = state.sessions().get(id).await?;
    let guard = session.lock().await;
    let list = match guard.page(page)? {
        Some(page_state) => AnnotationList {
            page,
            selected: page_state.annotations.selected(),
            annotations: page_state.annotations.annotations().to_vec(),
        },
        None => AnnotationList {
            page,
            selected: None,
            annotations: Vec::new(),
        },
    };
    Ok(Json(list))
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub id: Option<AnnotationId>,
}

/// PUT /api/v1/documents/:id/pages/:page/annotations/selection
async fn select_annotation(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
    Json(request): Json<SelectRequest>,
) -> Result<StatusCode> {
    let session = state.sessions().get(id).await?;
    let mut guard = session.lock().await;
    let layer = &mut guard.page_mut(page)?.annotations;
    if !layer.select(request.id) {
        if let Some(aid) = request.id {
            return Err(SessionError::AnnotationNotFound(aid).into());
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/documents/:id/pages/:page/annotations/:aid
async fn delete_annotation(
    State(state): State<AppState>,
    Path((id, page, aid)): Path<(Uuid, u32, AnnotationId)>,
) -> Result<StatusCode> {
    let session = state.sessions().get(id).await?;
    session.lock().await.delete_annotation(page, aid)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectTablesResponse {
    pub page: u32,
    pub created: Vec<AnnotationId>,
    pub total: usize,
}

/// POST /api/v1/documents/:id/pages/:page/annotations/detect-tables
///
/// Detected boxes are appended as pending TABLE annotations; existing
/// annotations are kept.
async fn detect_tables(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<DetectTablesResponse>> {
    let session = state.sessions().get(id).await?;
    let document = {
        let guard = session.lock().await;
        guard.page(page)?;
        guard.document().clone()
    };

    let detections = state.services().detect_tables(&document, page).await?;
    let boxes: Vec<_> = detections.iter().map(|d| d.bbox).collect();

    let mut guard = session.lock().await;
    let layer = &mut guard.page_mut(page)?.annotations;
    let created = layer.append_detected_tables(&boxes);
    let total = layer.len();

    tracing::info!(session_id = %id, page, detected = created.len(), "Appended detected tables");

    Ok(Json(DetectTablesResponse {
        page,
        created,
        total,
    }))
}

/// POST /api/v1/documents/:id/pages/:page/annotations/process
async fn process_annotations(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<BatchSummary>> {
    let summary = process_pending(
        state.sessions(),
        state.services(),
        id,
        page,
        state.config().services.extraction_timeout(),
    )
    .await?;
    Ok(Json(summary))
}
