//! Document sessions
//!
//! A `DocumentSession` owns everything the viewer knows about one uploaded
//! document: per-page state keyed by page number and the viewer state of
//! the page currently on screen. Uploading a new document creates a new
//! session; nothing carries over.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::annotations::{
    AnnotationId, AnnotationLayer, AnnotationResult, AnnotationType, Gesture, GestureOutcome,
    GestureRules,
};
use crate::geometry::{BBox, Point, Rotation, Size, ViewTransform, ZoomRange};
use crate::hit_test::{self, HitQuery, HitTarget, InteractionMode};
use crate::ocr::{OcrPage, TableResults, TextEdit, TextLine};
use crate::render::{FrameKey, PageRaster};
use crate::services::{DocumentFile, ProcessedPage};

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Page {0} image is not loaded")]
    PageNotLoaded(u32),

    #[error("Page {0} has no processing results")]
    ResultsNotAvailable(u32),

    #[error("Page {page} has no text line {index}")]
    LineNotFound { page: u32, index: usize },

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),

    #[error("No page is open")]
    NoPageOpen,

    #[error("Annotations on page {0} are already being processed")]
    BatchInProgress(u32),

    #[error("Invalid viewer update: {0}")]
    InvalidViewer(String),
}

/// Everything known about one page.
#[derive(Debug, Default)]
pub struct PageState {
    raster: Option<Arc<PageRaster>>,
    ocr: Option<OcrPage>,
    tables: Option<TableResults>,
    pub annotations: AnnotationLayer,
    pub rotation: Rotation,
    batch_running: Arc<AtomicBool>,
}

/// Held while a batch runs over one page's pending annotations.
#[derive(Debug)]
pub struct BatchGuard(Arc<AtomicBool>);

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PageState {
    /// Decoded image, present once the page has loaded.
    pub fn raster(&self) -> Option<&Arc<PageRaster>> {
        self.raster.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.raster.is_some()
    }

    pub fn ocr(&self) -> Option<&OcrPage> {
        self.ocr.as_ref()
    }

    pub fn tables(&self) -> Option<&TableResults> {
        self.tables.as_ref()
    }

    pub fn has_results(&self) -> bool {
        self.ocr.is_some() || self.tables.is_some()
    }

    /// Claim the page for a batch run; `None` while another batch holds it.
    pub fn begin_batch(&self) -> Option<BatchGuard> {
        self.batch_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BatchGuard(Arc::clone(&self.batch_running)))
    }

    pub fn batch_running(&self) -> bool {
        self.batch_running.load(Ordering::Acquire)
    }

    /// OCR line boxes in image space; empty until both image and OCR exist.
    pub fn text_boxes(&self) -> Vec<BBox> {
        match (&self.raster, &self.ocr) {
            (Some(raster), Some(ocr)) => ocr.line_boxes_in_image(raster.natural_size()),
            _ => Vec::new(),
        }
    }

    pub fn table_boxes(&self) -> Vec<BBox> {
        self.tables
            .as_ref()
            .map(|tables| tables.detections().iter().map(|d| d.bbox).collect())
            .unwrap_or_default()
    }
}

/// Pointer input in container-local screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Leave,
    /// Wheel zoom anchored at the pointer; negative `delta_y` zooms in.
    #[serde(rename_all = "camelCase")]
    Wheel { x: f64, y: f64, delta_y: f64 },
}

/// Result of one pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerOutcome {
    pub target: HitTarget,
    pub gesture: Option<GestureOutcome>,
    pub zoom: f64,
}

/// Interaction rules fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct ViewerRules {
    pub min_annotation_size: f64,
    pub handle_px: f64,
    pub zoom_range: ZoomRange,
    /// Largest accepted container side, in screen pixels.
    pub max_viewport_px: f64,
}

impl Default for ViewerRules {
    fn default() -> Self {
        Self {
            min_annotation_size: crate::annotations::MIN_ANNOTATION_SIZE,
            handle_px: 10.0,
            zoom_range: ZoomRange::default(),
            max_viewport_px: 8192.0,
        }
    }
}

/// Viewer state of the page on screen
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub mode: InteractionMode,
    pub armed: AnnotationType,
    pub container: Size,
    pub zoom: f64,
    pub pan: Point,
    pub gesture: Gesture,
    pub hover: HitTarget,
    pub inspected: HitTarget,
    revision: u64,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            mode: InteractionMode::default(),
            armed: AnnotationType::default(),
            container: Size::default(),
            zoom: 1.0,
            pan: Point::ZERO,
            gesture: Gesture::Idle,
            hover: HitTarget::None,
            inspected: HitTarget::None,
            revision: 0,
        }
    }
}

impl ViewerState {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Optional viewer settings from one update request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerUpdate {
    pub container: Option<Size>,
    pub mode: Option<InteractionMode>,
    pub armed: Option<AnnotationType>,
    pub zoom: Option<f64>,
    pub pan: Option<Point>,
    /// Relative pan, applied after `pan`.
    pub pan_by: Option<Point>,
    pub rotation: Option<Rotation>,
}

impl ViewerUpdate {
    fn validate(&self, rules: &ViewerRules) -> Result<(), SessionError> {
        if let Some(container) = self.container {
            let fits = |side: f64| side.is_finite() && (0.0..=rules.max_viewport_px).contains(&side);
            if !fits(container.width) || !fits(container.height) {
                return Err(SessionError::InvalidViewer(format!(
                    "container {}x{} must be within 0..={} pixels per side",
                    container.width, container.height, rules.max_viewport_px
                )));
            }
        }
        if self.zoom.is_some_and(|zoom| !zoom.is_finite()) {
            return Err(SessionError::InvalidViewer("zoom must be a finite number".to_string()));
        }
        for point in [self.pan, self.pan_by].into_iter().flatten() {
            if !(point.x.is_finite() && point.y.is_finite()) {
                return Err(SessionError::InvalidViewer("pan must be finite".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DocumentSession {
    id: Uuid,
    document: DocumentFile,
    total_pages: u32,
    current_page: Option<u32>,
    pages: BTreeMap<u32, PageState>,
    viewer: ViewerState,
    rules: ViewerRules,
}

impl DocumentSession {
    pub fn new(document: DocumentFile, total_pages: u32, rules: ViewerRules) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            total_pages,
            current_page: None,
            pages: BTreeMap::new(),
            viewer: ViewerState::default(),
            rules,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> &DocumentFile {
        &self.document
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn viewer(&self) -> &ViewerState {
        &self.viewer
    }

    pub fn rules(&self) -> ViewerRules {
        self.rules
    }

    fn check_page(&self, page: u32) -> Result<(), SessionError> {
        if page == 0 || page > self.total_pages {
            return Err(SessionError::PageOutOfRange {
                page,
                total: self.total_pages,
            });
        }
        Ok(())
    }

    pub fn page(&self, page: u32) -> Result<Option<&PageState>, SessionError> {
        self.check_page(page)?;
        Ok(self.pages.get(&page))
    }

    /// Page state, created empty on first access.
    pub fn page_mut(&mut self, page: u32) -> Result<&mut PageState, SessionError> {
        self.check_page(page)?;
        Ok(self.pages.entry(page).or_default())
    }

    /// Pages that have processing results, in page order.
    pub fn processed_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|(_, state)| state.has_results())
            .map(|(page, _)| *page)
            .collect()
    }

    /// Store processing results. Each page's results are written once;
    /// pages that already have results keep them.
    pub fn store_results(&mut self, processed: Vec<ProcessedPage>) -> Vec<u32> {
        let mut stored = Vec::new();
        for result in processed {
            let page = result.page;
            let Ok(state) = self.page_mut(page) else {
                tracing::warn!(page, "Ignoring results for a page outside the document");
                continue;
            };
            if state.has_results() {
                tracing::debug!(page, "Page already has results, keeping the first ones");
                continue;
            }
            state.ocr = Some(result.ocr);
            state.tables = Some(result.tables);
            stored.push(page);
        }
        if !stored.is_empty() {
            self.viewer.touch();
        }
        stored
    }

    /// Attach the decoded page image. Written once per page.
    pub fn store_raster(&mut self, page: u32, raster: PageRaster) -> Result<(), SessionError> {
        let state = self.page_mut(page)?;
        if state.raster.is_none() {
            state.raster = Some(Arc::new(raster));
            self.viewer.touch();
        }
        Ok(())
    }

    /// Switch the displayed page. Zoom, pan and any gesture reset; the
    /// page's rotation is kept.
    pub fn open_page(&mut self, page: u32) -> Result<(), SessionError> {
        self.page_mut(page)?;
        if self.current_page != Some(page) {
            tracing::debug!(session_id = %self.id, page, "Switching page");
        }
        self.current_page = Some(page);
        self.viewer.zoom = self.rules.zoom_range.clamp(1.0);
        self.viewer.pan = Point::ZERO;
        self.viewer.gesture = Gesture::Idle;
        self.viewer.hover = HitTarget::None;
        self.viewer.inspected = HitTarget::None;
        self.viewer.touch();
        Ok(())
    }

    /// Number and state of the page on screen.
    pub fn current(&self) -> Result<(u32, &PageState), SessionError> {
        let page = self.current_page.ok_or(SessionError::NoPageOpen)?;
        let state = self.pages.get(&page).ok_or(SessionError::PageNotLoaded(page))?;
        Ok((page, state))
    }

    /// View transform of the page on screen, once its image has loaded.
    pub fn view_transform(&self) -> Result<ViewTransform, SessionError> {
        let (page, state) = self.current()?;
        let raster = state.raster().ok_or(SessionError::PageNotLoaded(page))?;
        Ok(ViewTransform {
            natural: raster.natural_size(),
            container: self.viewer.container,
            rotation: state.rotation,
            zoom: self.viewer.zoom,
            pan: self.viewer.pan,
            zoom_range: self.rules.zoom_range,
        })
    }

    /// Apply a viewer update. The update is checked as a whole first, so a
    /// rejected one leaves the viewer unchanged.
    pub fn update_viewer(&mut self, update: ViewerUpdate) -> Result<(), SessionError> {
        update.validate(&self.rules)?;
        let pan_view = match update.pan_by {
            Some(_) => Some(self.view_transform()?),
            None => None,
        };
        if let Some(rotation) = update.rotation {
            let page = self.current_page.ok_or(SessionError::NoPageOpen)?;
            self.page_mut(page)?.rotation = rotation;
        }
        let viewer = &mut self.viewer;
        if let Some(container) = update.container {
            viewer.container = container;
        }
        if let Some(mode) = update.mode {
            if mode != viewer.mode {
                viewer.gesture = Gesture::Idle;
                viewer.hover = HitTarget::None;
            }
            viewer.mode = mode;
        }
        if let Some(armed) = update.armed {
            viewer.armed = armed;
        }
        if let Some(zoom) = update.zoom {
            viewer.zoom = self.rules.zoom_range.clamp(zoom);
        }
        if let Some(pan) = update.pan {
            viewer.pan = pan;
        }
        if let (Some(delta), Some(mut view)) = (update.pan_by, pan_view) {
            view.pan = viewer.pan;
            view.pan_by(delta);
            viewer.pan = view.pan;
        }
        viewer.touch();
        Ok(())
    }

    /// Run one pointer event through hit-testing and the gesture machine.
    pub fn pointer(&mut self, event: PointerEvent) -> Result<PointerOutcome, SessionError> {
        let mut view = self.view_transform()?;
        let (page, _) = self.current()?;

        if let PointerEvent::Wheel { x, y, delta_y } = event {
            if delta_y == 0.0 || !delta_y.is_finite() {
                return Ok(self.outcome(HitTarget::None, None));
            }
            let factor = if delta_y < 0.0 { 1.1 } else { 1.0 / 1.1 };
            view.zoom_at(factor, Point::new(x, y));
            self.viewer.zoom = view.zoom;
            self.viewer.pan = view.pan;
            self.viewer.touch();
            return Ok(self.outcome(HitTarget::None, None));
        }

        if let PointerEvent::Leave = event {
            let gesture = self.viewer.gesture.pointer_leave();
            self.viewer.hover = HitTarget::None;
            self.viewer.touch();
            return Ok(self.outcome(HitTarget::None, Some(gesture)));
        }

        let (PointerEvent::Down { x, y } | PointerEvent::Move { x, y } | PointerEvent::Up { x, y }) =
            event
        else {
            return Ok(self.outcome(HitTarget::None, None));
        };
        let Some(point) = view.to_image(Point::new(x, y)) else {
            return Ok(self.outcome(HitTarget::None, None));
        };

        let target = self.hit(page, point, &view);
        let rules = GestureRules {
            armed: self.viewer.armed,
            min_size: self.rules.min_annotation_size,
        };
        let mode = self.viewer.mode;

        let gesture = match (mode, event) {
            (InteractionMode::Inspect, PointerEvent::Down { .. }) => {
                self.viewer.inspected = target;
                None
            }
            (InteractionMode::Inspect, _) => None,
            (InteractionMode::Annotate, PointerEvent::Down { .. }) => {
                let layer = &mut self.pages.entry(page).or_default().annotations;
                Some(self.viewer.gesture.pointer_down(point, target, layer))
            }
            (InteractionMode::Annotate, PointerEvent::Move { .. }) => {
                Some(self.viewer.gesture.pointer_move(point))
            }
            (InteractionMode::Annotate, _) => {
                let layer = &mut self.pages.entry(page).or_default().annotations;
                Some(self.viewer.gesture.pointer_up(point, layer, rules))
            }
        };

        self.viewer.hover = target;
        self.viewer.touch();
        Ok(self.outcome(target, gesture))
    }

    fn outcome(&self, target: HitTarget, gesture: Option<GestureOutcome>) -> PointerOutcome {
        PointerOutcome {
            target,
            gesture,
            zoom: self.viewer.zoom,
        }
    }

    fn hit(&self, page: u32, point: Point, view: &ViewTransform) -> HitTarget {
        let Some(state) = self.pages.get(&page) else {
            return HitTarget::None;
        };
        let text_boxes = state.text_boxes();
        let table_boxes = state.table_boxes();
        hit_test::resolve(&HitQuery {
            point,
            mode: self.viewer.mode,
            annotations: state.annotations.annotations(),
            selected: state.annotations.selected(),
            text_boxes: &text_boxes,
            table_boxes: &table_boxes,
            view,
            handle_px: self.rules.handle_px,
        })
    }

    pub fn edit_line(&mut self, page: u32, index: usize, text: &str) -> Result<(), SessionError> {
        let state = self.page_mut(page)?;
        let ocr = state.ocr.as_mut().ok_or(SessionError::ResultsNotAvailable(page))?;
        if !ocr.edit_line(index, text) {
            return Err(SessionError::LineNotFound { page, index });
        }
        self.viewer.touch();
        Ok(())
    }

    /// Full (original, display) pair list for the save action.
    pub fn text_edits(&self, page: u32) -> Result<Vec<TextEdit>, SessionError> {
        self.page(page)?
            .and_then(PageState::ocr)
            .map(OcrPage::text_edits)
            .ok_or(SessionError::ResultsNotAvailable(page))
    }

    /// Page text for field extraction: OCR lines as displayed, then the
    /// lines of extracted TEXT annotations.
    pub fn page_text(&self, page: u32) -> Result<String, SessionError> {
        let state = self.page(page)?.ok_or(SessionError::ResultsNotAvailable(page))?;
        let mut lines: Vec<&str> = state
            .ocr()
            .map(|ocr| ocr.text_lines.iter().map(TextLine::display_text).collect())
            .unwrap_or_default();
        for annotation in state.annotations.annotations() {
            if let Some(AnnotationResult::Text(text)) = &annotation.result {
                lines.extend(text.text_lines.iter().map(TextLine::display_text));
            }
        }
        if lines.is_empty() {
            return Err(SessionError::ResultsNotAvailable(page));
        }
        Ok(lines.join("\n"))
    }

    pub fn delete_annotation(&mut self, page: u32, id: AnnotationId) -> Result<(), SessionError> {
        let state = self.page_mut(page)?;
        state
            .annotations
            .remove(id)
            .ok_or(SessionError::AnnotationNotFound(id))?;
        if self.viewer.gesture.adjusting() == Some(id) {
            self.viewer.gesture = Gesture::Idle;
        }
        Ok(())
    }

    /// Cache key of the current frame.
    pub fn frame_key(&self) -> Result<FrameKey, SessionError> {
        let (page, state) = self.current()?;
        Ok(FrameKey {
            session: self.id,
            page,
            layer_revision: state.annotations.revision(),
            view_revision: self.viewer.revision,
            viewport: (
                self.viewer.container.width.max(0.0).ceil() as u32,
                self.viewer.container.height.max(0.0).ceil() as u32,
            ),
        })
    }
}

pub type SharedSession = Arc<Mutex<DocumentSession>>;

struct SessionEntry {
    session: SharedSession,
    last_access: parking_lot::Mutex<Instant>,
}

impl SessionEntry {
    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

/// Live sessions keyed by id
///
/// Each `get` refreshes a session's last access. Sessions idle for longer
/// than the configured TTL are dropped by [`SessionManager::cleanup_expired`].
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    idle_ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE_TTL)
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    pub async fn insert(&self, session: DocumentSession) -> (Uuid, SharedSession) {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        let entry = SessionEntry {
            session: Arc::clone(&shared),
            last_access: parking_lot::Mutex::new(Instant::now()),
        };
        self.inner.write().await.insert(id, entry);
        tracing::info!(session_id = %id, "Created document session");
        (id, shared)
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, SessionError> {
        let sessions = self.inner.read().await;
        let entry = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
        *entry.last_access.lock() = Instant::now();
        Ok(Arc::clone(&entry.session))
    }

    /// True while `session` is still the live session for `id`.
    pub async fn is_current(&self, id: Uuid, session: &SharedSession) -> bool {
        self.inner
            .read()
            .await
            .get(&id)
            .is_some_and(|live| Arc::ptr_eq(&live.session, session))
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        self.inner
            .write()
            .await
            .remove(&id)
            .map(|_| tracing::info!(session_id = %id, "Removed document session"))
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL.
    ///
    /// Returns the ids that were removed.
    pub async fn cleanup_expired(&self) -> Vec<Uuid> {
        let expired: Vec<Uuid> = {
            let sessions = self.inner.read().await;
            sessions
                .iter()
                .filter(|(_, entry)| entry.idle_for() > self.idle_ttl)
                .map(|(id, _)| *id)
                .collect()
        };
        if expired.is_empty() {
            return expired;
        }

        let mut sessions = self.inner.write().await;
        // A session touched between the two locks stays.
        let removed: Vec<Uuid> = expired
            .into_iter()
            .filter(|id| {
                sessions
                    .get(id)
                    .is_some_and(|entry| entry.idle_for() > self.idle_ttl)
            })
            .collect();
        for id in &removed {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Cleaned up idle session");
        }
        tracing::info!(count = removed.len(), "Cleaned up idle document sessions");
        removed
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(
        self,
        every: Duration,
        on_removed: impl Fn(Uuid) + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;
                for id in self.cleanup_expired().await {
                    on_removed(id);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{AnnotationSource, ProcessingStatus};
    use crate::ocr::TextLine;
    use image::{Rgba, RgbaImage};

    fn session(total_pages: u32) -> DocumentSession {
        DocumentSession::new(
            DocumentFile::new("drawing.pdf", vec![0u8; 4]),
            total_pages,
            ViewerRules::default(),
        )
    }

    fn raster() -> PageRaster {
        PageRaster::from_rgba(RgbaImage::from_pixel(400, 200, Rgba([255, 255, 255, 255]))).unwrap()
    }

    fn processed(page: u32, lines: &[&str]) -> ProcessedPage {
        ProcessedPage {
            page,
            ocr: OcrPage {
                text_lines: lines
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let y = 20.0 * i as f64;
                        TextLine::new(*text, 0.9, BBox::new(10.0, y, 100.0, y + 15.0))
                    })
                    .collect(),
                ..Default::default()
            },
            tables: TableResults::default(),
        }
    }

    /// Session with page 1 open in a 400x200 container (scale 1).
    fn open_session() -> DocumentSession {
        let mut session = session(2);
        session.store_raster(1, raster()).unwrap();
        session.open_page(1).unwrap();
        session
            .update_viewer(ViewerUpdate {
                container: Some(Size::new(400.0, 200.0)),
                mode: Some(InteractionMode::Annotate),
                armed: Some(AnnotationType::Table),
                ..Default::default()
            })
            .unwrap();
        session
    }

    #[test]
    fn pages_outside_the_document_are_rejected() {
        let mut session = session(3);
        assert_eq!(
            session.open_page(4),
            Err(SessionError::PageOutOfRange { page: 4, total: 3 })
        );
        assert!(session.page_mut(0).is_err());
    }

    #[test]
    fn results_are_written_once() {
        let mut session = session(3);
        assert_eq!(session.store_results(vec![processed(1, &["A"]), processed(3, &["C"])]), vec![1, 3]);
        assert_eq!(session.store_results(vec![processed(1, &["changed"])]), Vec::<u32>::new());
        assert_eq!(session.page(1).unwrap().unwrap().ocr().unwrap().text_lines[0].text, "A");
        assert_eq!(session.processed_pages(), vec![1, 3]);
    }

    #[test]
    fn page_switch_keeps_rotation_and_resets_zoom() {
        let mut session = open_session();
        session
            .update_viewer(ViewerUpdate {
                zoom: Some(2.5),
                pan: Some(Point::new(30.0, -10.0)),
                rotation: Some(Rotation::Deg90),
                ..Default::default()
            })
            .unwrap();

        session.open_page(2).unwrap();
        assert_eq!(session.viewer().zoom, 1.0);
        assert_eq!(session.viewer().pan, Point::ZERO);

        session.open_page(1).unwrap();
        assert_eq!(session.page(1).unwrap().unwrap().rotation, Rotation::Deg90);
    }

    #[test]
    fn drag_creates_annotation_through_pointer_events() {
        let mut session = open_session();
        session.pointer(PointerEvent::Down { x: 50.0, y: 80.0 }).unwrap();
        session.pointer(PointerEvent::Move { x: 30.0, y: 50.0 }).unwrap();
        let outcome = session.pointer(PointerEvent::Up { x: 10.0, y: 20.0 }).unwrap();
        assert!(matches!(outcome.gesture, Some(GestureOutcome::Created { .. })));

        let layer = &session.page(1).unwrap().unwrap().annotations;
        assert_eq!(layer.len(), 1);
        let annotation = &layer.annotations()[0];
        assert_eq!(annotation.bbox.to_xyxy(), [10.0, 20.0, 50.0, 80.0]);
        assert_eq!(annotation.annotation_type, AnnotationType::Table);
        assert_eq!(annotation.source, AnnotationSource::Manual);
        assert_eq!(annotation.status, ProcessingStatus::Pending);
    }

    #[test]
    fn pointer_needs_a_loaded_page() {
        let mut session = session(2);
        session.open_page(1).unwrap();
        assert_eq!(
            session.pointer(PointerEvent::Down { x: 1.0, y: 1.0 }),
            Err(SessionError::PageNotLoaded(1))
        );
    }

    #[test]
    fn inspect_click_picks_ocr_line() {
        let mut session = open_session();
        session.store_results(vec![processed(1, &["NOTE 1", "NOTE 2"])]);
        session
            .update_viewer(ViewerUpdate {
                mode: Some(InteractionMode::Inspect),
                ..Default::default()
            })
            .unwrap();
        let outcome = session.pointer(PointerEvent::Down { x: 50.0, y: 27.0 }).unwrap();
        assert_eq!(outcome.target, HitTarget::OcrLine { index: 1 });
        assert_eq!(session.viewer().inspected, HitTarget::OcrLine { index: 1 });
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let mut session = open_session();
        for _ in 0..100 {
            session
                .pointer(PointerEvent::Wheel { x: 200.0, y: 100.0, delta_y: -1.0 })
                .unwrap();
        }
        assert_eq!(session.viewer().zoom, 5.0);
    }

    #[test]
    fn edits_feed_the_save_list() {
        let mut session = session(1);
        session.store_results(vec![processed(1, &["abc", "M6"])]);
        session.edit_line(1, 0, "abd").unwrap();
        assert_eq!(
            session.edit_line(1, 9, "x"),
            Err(SessionError::LineNotFound { page: 1, index: 9 })
        );
        let edits = session.text_edits(1).unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].original, "abc");
        assert_eq!(edits[0].edited, "abd");
        assert_eq!(edits[1].edited, "M6");
    }

    #[test]
    fn page_text_joins_edited_lines_and_text_annotations() {
        let mut session = session(2);
        assert_eq!(session.page_text(1), Err(SessionError::ResultsNotAvailable(1)));

        session.store_results(vec![processed(1, &["PART NO BRK-2041", "REV B"])]);
        session.edit_line(1, 1, "REV C").unwrap();
        let layer = &mut session.page_mut(1).unwrap().annotations;
        let id = layer.push(crate::annotations::Annotation::new(
            AnnotationType::Text,
            BBox::new(0.0, 0.0, 50.0, 50.0),
            AnnotationSource::Manual,
        ));
        layer.update(id, |a| {
            a.complete(AnnotationResult::Text(crate::annotations::TextResult {
                title: None,
                text_lines: vec![TextLine::new("MATERIAL 6061-T6", 1.0, BBox::new(0.0, 0.0, 1.0, 1.0))],
            }))
        });

        assert_eq!(
            session.page_text(1).unwrap(),
            "PART NO BRK-2041\nREV C\nMATERIAL 6061-T6"
        );
    }

    #[test]
    fn frame_key_changes_with_state() {
        let mut session = open_session();
        let before = session.frame_key().unwrap();
        session.pointer(PointerEvent::Move { x: 5.0, y: 5.0 }).unwrap();
        assert_ne!(before, session.frame_key().unwrap());
    }

    #[test]
    fn oversized_container_is_rejected_and_viewer_kept() {
        let mut session = open_session();
        let revision = session.viewer().revision();
        let err = session
            .update_viewer(ViewerUpdate {
                container: Some(Size::new(1e6, 1e6)),
                zoom: Some(3.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidViewer(_)));
        assert_eq!(session.viewer().container, Size::new(400.0, 200.0));
        assert_eq!(session.viewer().zoom, 1.0);
        assert_eq!(session.viewer().revision(), revision);

        assert!(session
            .update_viewer(ViewerUpdate {
                container: Some(Size::new(f64::NAN, 100.0)),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn relative_pan_adds_to_current_pan() {
        let mut session = open_session();
        session
            .update_viewer(ViewerUpdate {
                pan: Some(Point::new(10.0, 5.0)),
                pan_by: Some(Point::new(-4.0, 20.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.viewer().pan, Point::new(6.0, 25.0));

        session
            .update_viewer(ViewerUpdate {
                pan_by: Some(Point::new(1.0, 1.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.viewer().pan, Point::new(7.0, 26.0));
    }

    #[test]
    fn zero_wheel_delta_leaves_zoom_alone() {
        let mut session = open_session();
        let revision = session.viewer().revision();
        session
            .pointer(PointerEvent::Wheel { x: 100.0, y: 50.0, delta_y: 0.0 })
            .unwrap();
        assert_eq!(session.viewer().zoom, 1.0);
        assert_eq!(session.viewer().pan, Point::ZERO);
        assert_eq!(session.viewer().revision(), revision);
    }

    #[test]
    fn one_batch_per_page() {
        let mut session = open_session();
        let state = session.page_mut(1).unwrap();
        let guard = state.begin_batch().unwrap();
        assert!(state.batch_running());
        assert!(state.begin_batch().is_none());
        drop(guard);
        assert!(!state.batch_running());
        assert!(state.begin_batch().is_some());
    }

    #[tokio::test]
    async fn idle_sessions_are_cleaned_up() {
        let manager = SessionManager::with_idle_ttl(Duration::from_millis(30));
        let (idle, _) = manager.insert(session(1)).await;
        let (active, _) = manager.insert(session(1)).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        manager.get(active).await.unwrap();

        assert_eq!(manager.cleanup_expired().await, vec![idle]);
        assert_eq!(manager.get(idle).await.err(), Some(SessionError::NotFound(idle)));
        assert!(manager.get(active).await.is_ok());
        assert!(manager.cleanup_expired().await.is_empty());
    }

    #[tokio::test]
    async fn manager_tracks_replaced_sessions() {
        let manager = SessionManager::new();
        let (id, shared) = manager.insert(session(1)).await;
        assert!(manager.is_current(id, &shared).await);

        manager.remove(id).await.unwrap();
        assert!(!manager.is_current(id, &shared).await);
        assert_eq!(manager.get(id).await.err(), Some(SessionError::NotFound(id)));
    }
}
