//! Annotation types
//!
//! An annotation is a rectangle in image space tagged with the kind of
//! extraction the user wants for it. Its result payload is a tagged union
//! discriminated by the same type, so consumers branch exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::BBox;
use crate::ocr::TextLine;

pub type AnnotationId = Uuid;

/// Kind of extraction requested for a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationType {
    #[default]
    Text,
    Table,
    Diagram,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Table => "TABLE",
            Self::Diagram => "DIAGRAM",
        }
    }
}

/// Processing lifecycle
///
/// `Processed` and `ProcessedWithError` are terminal: they are re-rendered
/// but never picked up again by batch processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Processed,
    ProcessedWithError,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::ProcessedWithError)
    }
}

/// How the annotation came to exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationSource {
    #[default]
    Manual,
    AutoDetected,
}

/// Text extraction output: OCR-like lines, optionally titled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub text_lines: Vec<TextLine>,
}

/// Table extraction output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    pub title: String,
    pub description: String,
    pub html: String,
}

/// One callout on a diagram and what it specifies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marking {
    pub marking: String,
    pub description: String,
}

/// Diagram extraction output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramResult {
    pub heading: String,
    pub description: String,
    #[serde(default)]
    pub markings: Vec<Marking>,
}

/// Extraction payload, discriminated by annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "UPPERCASE")]
pub enum AnnotationResult {
    Text(TextResult),
    Table(TableResult),
    Diagram(DiagramResult),
}

impl AnnotationResult {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            Self::Text(_) => AnnotationType::Text,
            Self::Table(_) => AnnotationType::Table,
            Self::Diagram(_) => AnnotationType::Diagram,
        }
    }
}

/// A user-drawn or auto-detected region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Image-space box, always normalized.
    pub bbox: BBox,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnnotationResult>,
    /// Error message when `status` is `ProcessedWithError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: AnnotationSource,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// Create a pending annotation.
    pub fn new(annotation_type: AnnotationType, bbox: BBox, source: AnnotationSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            annotation_type,
            bbox,
            status: ProcessingStatus::Pending,
            result: None,
            error: None,
            source,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProcessingStatus::Pending
    }

    pub fn has_error(&self) -> bool {
        self.status == ProcessingStatus::ProcessedWithError
    }

    /// Attach a successful result.
    pub fn complete(&mut self, result: AnnotationResult) {
        self.status = ProcessingStatus::Processed;
        self.result = Some(result);
        self.error = None;
    }

    /// Mark as processed with an error message in place of a result.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ProcessingStatus::ProcessedWithError;
        self.result = None;
        self.error = Some(message.into());
    }
}
