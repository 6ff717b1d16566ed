//! Viewer Routes
//!
//! Endpoints:
//! - GET /api/v1/documents/:id/viewer - Current viewer state
//! - PUT /api/v1/documents/:id/viewer - Container size, mode, armed type, zoom, pan, rotation
//! - POST /api/v1/documents/:id/viewer/pointer - One pointer event
//! - GET /api/v1/documents/:id/viewer/frame.png - Rendered viewport

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::annotations::AnnotationType;
use crate::document::{DocumentSession, PointerEvent, PointerOutcome, SessionError, ViewerUpdate};
use crate::error::Result;
use crate::geometry::{Point, Rotation, Size};
use crate::hit_test::{HitTarget, InteractionMode};
use crate::render::{self, Scene};
use crate::state::AppState;

/// Create the viewer router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/viewer", get(get_viewer).put(update_viewer))
        .route("/:id/viewer/pointer", post(pointer))
        .route("/:id/viewer/frame.png", get(frame))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerResponse {
    pub page: Option<u32>,
    pub mode: InteractionMode,
    pub armed: AnnotationType,
    pub container: Size,
    pub zoom: f64,
    pub pan: Point,
    pub rotation: Rotation,
    pub hover: HitTarget,
    pub inspected: HitTarget,
    pub drawing: bool,
}

impl ViewerResponse {
    fn from_session(session: &DocumentSession) -> Self {
        let viewer = session.viewer();
        let rotation = session
            .current()
            .map(|(_, page)| page.rotation)
            .unwrap_or_default();
        Self {
            page: session.current_page(),
            mode: viewer.mode,
            armed: viewer.armed,
            container: viewer.container,
            zoom: viewer.zoom,
            pan: viewer.pan,
            rotation,
            hover: viewer.hover,
            inspected: viewer.inspected,
            drawing: viewer.gesture.is_active(),
        }
    }
}

/// GET /api/v1/documents/:id/viewer
async fn get_viewer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewerResponse>> {
    let session = state.sessions().get(id).await?;
    let guard = session.lock().await;
    Ok(Json(ViewerResponse::from_session(&guard)))
}

/// PUT /api/v1/documents/:id/viewer
async fn update_viewer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ViewerUpdate>,
) -> Result<Json<ViewerResponse>> {
    let session = state.sessions().get(id).await?;
    let mut guard = session.lock().await;
    guard.update_viewer(update)?;
    Ok(Json(ViewerResponse::from_session(&guard)))
}

/// POST /api/v1/documents/:id/viewer/pointer
async fn pointer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<PointerEvent>,
) -> Result<Json<PointerOutcome>> {
    let session = state.sessions().get(id).await?;
    let outcome = session.lock().await.pointer(event)?;
    if let Some(gesture) = outcome.gesture {
        tracing::trace!(session_id = %id, ?gesture, "Pointer gesture");
    }
    Ok(Json(outcome))
}

/// GET /api/v1/documents/:id/viewer/frame.png
///
/// 204 while the viewer container has no size.
async fn frame(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let session = state.sessions().get(id).await?;
    let guard = session.lock().await;
    let key = guard.frame_key()?;

    if let Some(png) = state.render_cache().get(&key) {
        return Ok(png_response(png.as_ref().clone()));
    }

    let view = guard.view_transform()?;
    let (page, page_state) = guard.current()?;
    let raster = page_state
        .raster()
        .ok_or(SessionError::PageNotLoaded(page))?;
    let text_boxes = page_state.text_boxes();
    let table_boxes = page_state.table_boxes();
    let viewer = guard.viewer();

    let scene = Scene {
        raster,
        view,
        mode: viewer.mode,
        text_boxes: &text_boxes,
        table_boxes: &table_boxes,
        annotations: page_state.annotations.annotations(),
        selected: page_state.annotations.selected(),
        hover: viewer.hover,
        inspected: viewer.inspected,
        gesture: viewer.gesture,
        armed: viewer.armed,
        handle_px: guard.rules().handle_px,
    };

    match render::render_png(&scene)? {
        Some(png) => {
            let png = state.render_cache().insert(key, png);
            Ok(png_response(png.as_ref().clone()))
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

fn png_response(png: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Bytes::from(png),
    )
        .into_response()
}
