//! Annotations Module
//!
//! User-drawn and auto-detected regions of interest on a page, the pointer
//! gesture machine that edits them, and the batch loop that sends them to
//! the extraction service.

mod batch;
mod gesture;
mod layer;
mod types;

pub use batch::{process_pending, BatchSummary, DEFAULT_EXTRACTION_TIMEOUT};
pub use gesture::{resize_from_corner, Gesture, GestureOutcome, GestureRules, MIN_ANNOTATION_SIZE};
pub use layer::AnnotationLayer;
pub use types::{
    Annotation, AnnotationId, AnnotationResult, AnnotationSource, AnnotationType, DiagramResult,
    Marking, ProcessingStatus, TableResult, TextResult,
};
