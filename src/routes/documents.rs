//! Document Routes
//!
//! Endpoints:
//! - POST /api/v1/documents - Upload a document, start a session
//! - DELETE /api/v1/documents/:id - Drop a session
//! - POST /api/v1/documents/:id/process - OCR + table detection for a page selection
//! - POST /api/v1/documents/:id/pages/:page/open - Load a page image and show it
//! - GET /api/v1/documents/:id/pages/:page/results - OCR lines and tables
//! - PUT /api/v1/documents/:id/pages/:page/lines/:index - Correct a text line
//! - POST /api/v1/documents/:id/pages/:page/edits/save - Persist all line edits
//! - POST /api/v1/documents/:id/pages/:page/fields - Extract named fields from page text

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{parse_page_selection, DocumentSession, SessionError};
use crate::error::{AppError, Result};
use crate::fields::{parse_field_lines, ExtractedField, FieldSpec};
use crate::geometry::{BBox, Rotation};
use crate::ocr::TableClass;
use crate::render::PageRaster;
use crate::services::{DocumentFile, DocumentKind};
use crate::state::AppState;

/// Create the documents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_document))
        .route("/:id", delete(delete_document))
        .route("/:id/process", post(process_document))
        .route("/:id/pages/:page/open", post(open_page))
        .route("/:id/pages/:page/results", get(page_results))
        .route("/:id/pages/:page/lines/:index", put(edit_line))
        .route("/:id/pages/:page/edits/save", post(save_edits))
        .route("/:id/pages/:page/fields", post(extract_fields))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub file_name: String,
    pub kind: DocumentKind,
    pub total_pages: u32,
}

/// POST /api/v1/documents
///
/// Multipart upload with a `file` field. A PDF is counted by the info
/// service; a single image becomes a one-page document whose raster is the
/// upload itself.
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut document = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field.bytes().await?;
        document = Some(DocumentFile::new(file_name, bytes));
    }
    let document = document.ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;
    if document.bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let (total_pages, raster) = match document.kind {
        DocumentKind::Image => {
            let bytes = document.bytes.clone();
            let raster = tokio::task::spawn_blocking(move || PageRaster::decode(&bytes))
                .await
                .map_err(|e| AppError::Internal(format!("Decode task failed: {}", e)))?
                .map_err(|e| AppError::BadRequest(format!("Unreadable image: {}", e)))?;
            (1, Some(raster))
        }
        DocumentKind::Pdf => {
            let info = state.services().document_info(&document).await?;
            if info.total_pages == 0 {
                return Err(AppError::BadRequest("Document has no pages".to_string()));
            }
            (info.total_pages, None)
        }
    };

    let file_name = document.file_name.clone();
    let kind = document.kind;
    let mut session = DocumentSession::new(document, total_pages, state.config().viewer.rules());
    if let Some(raster) = raster {
        session.store_raster(1, raster)?;
    }
    let (session_id, _) = state.sessions().insert(session).await;

    tracing::info!(%session_id, %file_name, ?kind, total_pages, "Document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            session_id,
            file_name,
            kind,
            total_pages,
        }),
    ))
}

/// DELETE /api/v1/documents/:id
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions().remove(id).await?;
    state.render_cache().invalidate_session(id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub page_selection: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub total_pages: u32,
    pub requested_pages: Vec<u32>,
    /// Pages whose results were stored by this request.
    pub processed_pages: Vec<u32>,
    /// Every page that has results so far.
    pub available_pages: Vec<u32>,
}

/// POST /api/v1/documents/:id/process
async fn process_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>> {
    let session = state.sessions().get(id).await?;
    let (document, total_pages) = {
        let guard = session.lock().await;
        (guard.document().clone(), guard.total_pages())
    };

    // Validate locally so a bad selection never reaches the service.
    let requested_pages = parse_page_selection(&request.page_selection, total_pages)?;

    let processed = state
        .services()
        .process_pages(&document, &request.page_selection)
        .await?;

    let mut guard = session.lock().await;
    let processed_pages = guard.store_results(
        processed
            .into_iter()
            .filter(|page| requested_pages.contains(&page.page))
            .collect(),
    );

    tracing::info!(session_id = %id, ?processed_pages, "Stored page results");

    Ok(Json(ProcessResponse {
        total_pages,
        requested_pages,
        processed_pages,
        available_pages: guard.processed_pages(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPageResponse {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub has_results: bool,
}

/// POST /api/v1/documents/:id/pages/:page/open
///
/// Fetches and decodes the page image on first open, then makes it the
/// displayed page.
async fn open_page(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<OpenPageResponse>> {
    let session = state.sessions().get(id).await?;
    let (document, loaded) = {
        let guard = session.lock().await;
        let loaded = guard.page(page)?.is_some_and(|p| p.is_loaded());
        (guard.document().clone(), loaded)
    };

    if !loaded {
        let encoded = state.services().page_image(&document, page).await?;
        let raster = tokio::task::spawn_blocking(move || PageRaster::decode(&encoded))
            .await
            .map_err(|e| AppError::Internal(format!("Decode task failed: {}", e)))??;
        tracing::debug!(session_id = %id, page, size = ?raster.natural_size(), "Decoded page image");
        session.lock().await.store_raster(page, raster)?;
    }

    let mut guard = session.lock().await;
    guard.open_page(page)?;
    let (_, page_state) = guard.current()?;
    let raster = page_state
        .raster()
        .ok_or_else(|| AppError::Internal(format!("Page {} lost its image", page)))?;

    Ok(Json(OpenPageResponse {
        page,
        width: raster.image().width(),
        height: raster.image().height(),
        rotation: page_state.rotation,
        has_results: page_state.has_results(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub index: usize,
    /// Edited text when present, else the OCR text.
    pub text: String,
    pub original: String,
    pub edited: bool,
    pub confidence: f64,
    /// Box in image pixels.
    pub bbox: BBox,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub index: usize,
    pub bbox: BBox,
    pub class: TableClass,
    pub html: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResults {
    pub page: u32,
    pub languages: Vec<String>,
    pub lines: Vec<LineView>,
    pub tables: Vec<TableView>,
}

/// GET /api/v1/documents/:id/pages/:page/results
async fn page_results(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<PageResults>> {
    let session = state.sessions().get(id).await?;
    let guard = session.lock().await;
    let page_state = guard
        .page(page)?
        .filter(|p| p.has_results())
        .ok_or(SessionError::ResultsNotAvailable(page))?;

    let image_boxes = page_state.text_boxes();
    let ocr = page_state.ocr();
    let lines = ocr
        .map(|ocr| {
            ocr.text_lines
                .iter()
                .enumerate()
                .map(|(index, line)| LineView {
                    index,
                    text: line.display_text().to_string(),
                    original: line.text.clone(),
                    edited: line.is_edited(),
                    confidence: line.confidence,
                    bbox: image_boxes.get(index).copied().unwrap_or(line.bbox),
                })
                .collect()
        })
        .unwrap_or_default();

    let tables = page_state
        .tables()
        .map(|tables| {
            tables
                .detections()
                .iter()
                .enumerate()
                .map(|(index, detection)| TableView {
                    index,
                    bbox: detection.bbox,
                    class: detection.class,
                    html: tables.html_for(index).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(PageResults {
        page,
        languages: ocr.map(|ocr| ocr.languages.clone()).unwrap_or_default(),
        lines,
        tables,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EditLineRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLineResponse {
    pub index: usize,
    pub text: String,
    pub edited: bool,
}

/// PUT /api/v1/documents/:id/pages/:page/lines/:index
async fn edit_line(
    State(state): State<AppState>,
    Path((id, page, index)): Path<(Uuid, u32, usize)>,
    Json(request): Json<EditLineRequest>,
) -> Result<Json<EditLineResponse>> {
    let session = state.sessions().get(id).await?;
    let mut guard = session.lock().await;
    guard.edit_line(page, index, &request.text)?;

    let line = guard
        .page(page)?
        .and_then(|p| p.ocr())
        .and_then(|ocr| ocr.text_lines.get(index))
        .ok_or(SessionError::LineNotFound { page, index })?;

    Ok(Json(EditLineResponse {
        index,
        text: line.display_text().to_string(),
        edited: line.is_edited(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEditsResponse {
    pub page: u32,
    pub lines: usize,
    pub edited: usize,
}

/// POST /api/v1/documents/:id/pages/:page/edits/save
async fn save_edits(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
) -> Result<Json<SaveEditsResponse>> {
    let session = state.sessions().get(id).await?;
    let (edits, edited) = {
        let guard = session.lock().await;
        let edits = guard.text_edits(page)?;
        let edited = guard
            .page(page)?
            .and_then(|p| p.ocr())
            .map(|ocr| ocr.edited_count())
            .unwrap_or(0);
        (edits, edited)
    };

    state.services().save_text_edits(page, &edits).await?;

    Ok(Json(SaveEditsResponse {
        page,
        lines: edits.len(),
        edited,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FieldsRequest {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsResponse {
    pub page: u32,
    pub fields: Vec<ExtractedField>,
}

/// POST /api/v1/documents/:id/pages/:page/fields
///
/// Fields are looked up in the page's OCR lines (edits applied) and the
/// text of extracted TEXT annotations.
async fn extract_fields(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, u32)>,
    Json(request): Json<FieldsRequest>,
) -> Result<Json<FieldsResponse>> {
    if request.fields.is_empty() {
        return Err(AppError::BadRequest("No fields requested".to_string()));
    }
    if let Some(field) = request.fields.iter().find(|f| f.name.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "Field name must not be empty (description: {:?})",
            field.description
        )));
    }

    let session = state.sessions().get(id).await?;
    let content = session.lock().await.page_text(page)?;

    let answer = state.services().extract_fields(&content, &request.fields).await?;
    let fields = parse_field_lines(&answer, &request.fields);

    tracing::info!(
        session_id = %id,
        page,
        requested = request.fields.len(),
        found = fields.len(),
        "Extracted fields"
    );

    Ok(Json(FieldsResponse { page, fields }))
}
