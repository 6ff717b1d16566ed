//! Batch extraction of pending annotations
//!
//! Pending annotations on a page are sent to the extraction service one at
//! a time, in z-order. The session lock is taken only to snapshot and to
//! apply results, never across a service call. Only one batch runs per page;
//! a second request while one is running gets `BatchInProgress`. A failure,
//! timeout or malformed response marks that one annotation and the loop
//! moves on.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::document::{SessionError, SessionManager};
use crate::geometry::{BBox, Rotation};
use crate::render::{crop_for_extraction, PageRaster};
use crate::services::{DocumentServices, ExtractionRequest, ServiceError};

use super::types::{AnnotationId, AnnotationResult, AnnotationType, ProcessingStatus};

/// Default per-annotation extraction timeout.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub page: u32,
    pub processed: usize,
    pub failed: usize,
    /// Set when the session was replaced mid-batch and results were dropped.
    pub discarded: bool,
}

struct Job {
    id: AnnotationId,
    annotation_type: AnnotationType,
    bbox: BBox,
    rotation: Rotation,
}

/// Process every pending annotation on `page` of session `session_id`.
pub async fn process_pending(
    sessions: &SessionManager,
    services: &dyn DocumentServices,
    session_id: Uuid,
    page: u32,
    timeout: Duration,
) -> Result<BatchSummary, SessionError> {
    let session = sessions.get(session_id).await?;

    let (raster, queue, _batch) = {
        let guard = session.lock().await;
        let state = guard.page(page)?.ok_or(SessionError::PageNotLoaded(page))?;
        let raster = state.raster().cloned().ok_or(SessionError::PageNotLoaded(page))?;
        let batch = state.begin_batch().ok_or(SessionError::BatchInProgress(page))?;
        (raster, state.annotations.pending_ids(), batch)
    };

    tracing::info!(%session_id, page, pending = queue.len(), "Processing annotations");
    let mut summary = BatchSummary {
        page,
        ..Default::default()
    };

    for id in queue {
        let job = {
            let mut guard = session.lock().await;
            let state = guard.page_mut(page)?;
            let rotation = state.rotation;
            let Some(annotation) = state.annotations.get(id).filter(|a| a.is_pending()) else {
                // Deleted or already handled since the snapshot.
                continue;
            };
            let job = Job {
                id,
                annotation_type: annotation.annotation_type,
                bbox: annotation.bbox,
                rotation,
            };
            state
                .annotations
                .update(id, |a| a.status = ProcessingStatus::Processing);
            job
        };

        let outcome = extract(services, &raster, &job, timeout).await;

        if !sessions.is_current(session_id, &session).await {
            tracing::warn!(%session_id, page, "Session replaced during processing, discarding results");
            summary.discarded = true;
            break;
        }

        let succeeded = outcome.is_ok();
        let mut guard = session.lock().await;
        let state = guard.page_mut(page)?;
        let applied = state.annotations.update(id, |annotation| match outcome {
            Ok(result) => annotation.complete(result),
            Err(message) => annotation.fail(message),
        });
        if !applied {
            tracing::debug!(annotation_id = %id, "Annotation deleted while in flight");
            continue;
        }
        if succeeded {
            summary.processed += 1;
        } else {
            summary.failed += 1;
        }
    }

    tracing::info!(
        %session_id,
        page,
        processed = summary.processed,
        failed = summary.failed,
        discarded = summary.discarded,
        "Annotation processing finished"
    );
    Ok(summary)
}

/// One crop-and-extract round trip. Errors come back as the message to
/// store on the annotation.
async fn extract(
    services: &dyn DocumentServices,
    raster: &PageRaster,
    job: &Job,
    timeout: Duration,
) -> Result<AnnotationResult, String> {
    let crop = crop_for_extraction(raster.image(), job.bbox, job.rotation).map_err(|e| {
        tracing::warn!(annotation_id = %job.id, error = %e, "Failed to crop annotation");
        e.to_string()
    })?;

    let request = ExtractionRequest {
        annotation_id: job.id,
        annotation_type: job.annotation_type,
        bbox: crop.bbox,
        rotation: job.rotation,
        image_png: crop.png,
    };

    tracing::debug!(
        annotation_id = %job.id,
        annotation_type = job.annotation_type.as_str(),
        bbox = ?request.bbox,
        rotation = job.rotation.degrees(),
        "Extracting annotation"
    );

    let result = match tokio::time::timeout(timeout, services.extract_annotation(&request)).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(timeout)),
    };

    match result {
        Ok(result) if result.annotation_type() != job.annotation_type => {
            tracing::warn!(annotation_id = %job.id, "Extraction returned a result of the wrong type");
            Err(ServiceError::Malformed("result type does not match the annotation".to_string())
                .user_message())
        }
        Ok(result) => Ok(result),
        Err(e) => {
            tracing::warn!(annotation_id = %job.id, error = %e, "Annotation extraction failed");
            Err(e.user_message())
        }
    }
}
