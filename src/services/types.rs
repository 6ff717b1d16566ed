//! External service types
//!
//! Wire shapes of the document-processing backend and their conversion into
//! the viewer's own model. Conversion happens once, at the boundary, so the
//! rest of the crate never sees raw `[x1, y1, x2, y2]` arrays or class ids.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::annotations::{
    AnnotationId, AnnotationResult, AnnotationType, DiagramResult, Marking, TableResult,
    TextResult,
};
use crate::geometry::{BBox, Point, Rotation};
use crate::ocr::{OcrPage, TableClass, TableDetection, TableResults, TextEdit, TextLine};

/// Errors talking to the external services
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ServiceError {
    /// Message shown to the user and stored on failed annotations.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "No response from the service".to_string(),
            Self::Service { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Service { status, .. } => format!("Service request failed with status {}", status),
            Self::Malformed(_) => "The service returned an unreadable response".to_string(),
            Self::Timeout(limit) => format!("No response within {:?}", limit),
        }
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// What an upload holds, sniffed from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Multi-page document rasterized by the backend.
    Pdf,
    /// Single raster image; it is its own page 1.
    Image,
}

impl DocumentKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(_) => Self::Image,
            Err(_) => Self::Pdf,
        }
    }
}

/// An uploaded document as the services receive it.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub file_name: String,
    pub bytes: axum::body::Bytes,
    pub kind: DocumentKind,
}

impl DocumentFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<axum::body::Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            kind: DocumentKind::sniff(&bytes),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == DocumentKind::Image
    }
}

/// Document metadata from the info service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub total_pages: u32,
    #[serde(default)]
    pub file_name: String,
}

/// Results for one processed page, already in the viewer's model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPage {
    pub page: u32,
    pub ocr: OcrPage,
    pub tables: TableResults,
}

/// Everything the extraction service needs for one annotation.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub annotation_id: AnnotationId,
    pub annotation_type: AnnotationType,
    /// Integer image-pixel box the crop was cut from.
    pub bbox: [i64; 4],
    /// Rotation the crop was rendered with.
    pub rotation: Rotation,
    /// PNG-encoded crop.
    pub image_png: Vec<u8>,
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireTextLine {
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
    pub bbox: [f64; 4],
    #[serde(default)]
    pub polygon: Option<Vec<[f64; 2]>>,
}

impl From<WireTextLine> for TextLine {
    fn from(wire: WireTextLine) -> Self {
        let mut line = TextLine::new(wire.text, wire.confidence, BBox::from_xyxy(wire.bbox));
        line.polygon = wire
            .polygon
            .map(|points| points.into_iter().map(|[x, y]| Point::new(x, y)).collect());
        line
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireOcrResult {
    #[serde(default)]
    pub text_lines: Vec<WireTextLine>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub image_bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireTableBox {
    #[serde(default)]
    pub class_id: i64,
    pub xyxy: [f64; 4],
}

impl From<WireTableBox> for TableDetection {
    fn from(wire: WireTableBox) -> Self {
        Self {
            bbox: BBox::from_xyxy(wire.xyxy),
            class: TableClass::from_class_id(wire.class_id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireTables {
    #[serde(default)]
    pub bbox_data: Vec<WireTableBox>,
    #[serde(default)]
    pub html: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireProcessedPage {
    pub page: u32,
    #[serde(default)]
    pub ocr_data: Vec<WireOcrResult>,
    #[serde(default)]
    pub tables: WireTables,
}

impl From<WireProcessedPage> for ProcessedPage {
    fn from(wire: WireProcessedPage) -> Self {
        let mut ocr = OcrPage::default();
        // One OCR prediction per rasterized page image; later ones extend it.
        for (index, result) in wire.ocr_data.into_iter().enumerate() {
            if index == 0 {
                ocr.image_bbox = result.image_bbox.map(BBox::from_xyxy);
                ocr.languages = result.languages.unwrap_or_default();
            }
            ocr.text_lines
                .extend(result.text_lines.into_iter().map(TextLine::from));
        }
        let detections = wire
            .tables
            .bbox_data
            .into_iter()
            .map(TableDetection::from)
            .collect();
        Self {
            page: wire.page,
            ocr,
            tables: TableResults::new(detections, wire.tables.html),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireProcessResponse {
    #[serde(default)]
    pub processed_pages: Vec<WireProcessedPage>,
}

/// Response of the single-image OCR endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct WireImageOcr {
    #[serde(default)]
    pub results: Vec<WireOcrResult>,
    #[serde(default)]
    pub tables: WireTables,
}

impl From<WireImageOcr> for ProcessedPage {
    fn from(wire: WireImageOcr) -> Self {
        ProcessedPage::from(WireProcessedPage {
            page: 1,
            ocr_data: wire.results,
            tables: wire.tables,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePageImage {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDetectedTables {
    #[serde(default)]
    pub bbox_data: Vec<WireTableBox>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTextEdits<'a> {
    pub page: u32,
    pub edits: &'a [TextEdit],
}

/// Field names mapped to typed descriptions.
#[derive(Debug, Serialize)]
pub(crate) struct WireFieldRequest<'a> {
    pub content: &'a str,
    pub fields: BTreeMap<&'a str, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireFieldAnswer {
    #[serde(default)]
    pub response: String,
}

/// Error body FastAPI-style services send with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct WireErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl WireErrorBody {
    pub fn into_message(self) -> Option<String> {
        let detail = self.detail.map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        });
        detail.or(self.message).or(self.error)
    }
}

// ============================================================================
// Extraction envelope
// ============================================================================

/// Response of the annotation-extraction service.
///
/// `success` is the discriminant. A 2xx response with `success: false` or a
/// non-empty `error` is a service error.
#[derive(Debug, Deserialize)]
pub struct ExtractionEnvelope {
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTextResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text_lines: Option<Vec<WireTextLine>>,
    #[serde(default)]
    extracted_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTableResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    html: String,
}

#[derive(Debug, Deserialize)]
struct WireDiagramResult {
    #[serde(default, alias = "heading")]
    diag_heading: String,
    #[serde(default, alias = "description")]
    diag_description: String,
    #[serde(default, alias = "markings")]
    annotations: Vec<Marking>,
}

impl ExtractionEnvelope {
    /// Classify the envelope and decode the payload for `annotation_type`.
    pub fn into_result(self, annotation_type: AnnotationType) -> Result<AnnotationResult, ServiceError> {
        let error = self.error.filter(|message| !message.trim().is_empty());
        if !self.success || error.is_some() {
            return Err(ServiceError::Service {
                status: 200,
                message: error.unwrap_or_else(|| "Extraction failed".to_string()),
            });
        }
        let payload = self
            .result
            .ok_or_else(|| ServiceError::Malformed("successful response without a result".to_string()))?;
        decode_result(annotation_type, payload)
    }
}

fn decode_result(
    annotation_type: AnnotationType,
    payload: serde_json::Value,
) -> Result<AnnotationResult, ServiceError> {
    let malformed = |err: serde_json::Error| {
        ServiceError::Malformed(format!("{} result: {}", annotation_type.as_str(), err))
    };
    match annotation_type {
        AnnotationType::Text => {
            let wire: WireTextResult = serde_json::from_value(payload).map_err(malformed)?;
            let text_lines = match (wire.text_lines, wire.extracted_content) {
                (Some(lines), _) => lines.into_iter().map(TextLine::from).collect(),
                (None, Some(content)) => content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| TextLine::new(line, 1.0, BBox::new(0.0, 0.0, 0.0, 0.0)))
                    .collect(),
                (None, None) => Vec::new(),
            };
            Ok(AnnotationResult::Text(TextResult {
                title: wire.title,
                text_lines,
            }))
        }
        AnnotationType::Table => {
            let wire: WireTableResult = serde_json::from_value(payload).map_err(malformed)?;
            Ok(AnnotationResult::Table(TableResult {
                title: wire.title,
                description: wire.description,
                html: wire.html,
            }))
        }
        AnnotationType::Diagram => {
            let wire: WireDiagramResult = serde_json::from_value(payload).map_err(malformed)?;
            Ok(AnnotationResult::Diagram(DiagramResult {
                heading: wire.diag_heading,
                description: wire.diag_description,
                markings: wire.annotations,
            }))
        }
    }
}

/// Decode a `data:image/...;base64,` URL (or bare base64) into raw bytes.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, ServiceError> {
    let encoded = match data.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => {
            if !header.ends_with(";base64") {
                return Err(ServiceError::Malformed(format!(
                    "unsupported data URL encoding: {}",
                    header
                )));
            }
            payload
        }
        _ => data,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ServiceError::Malformed(format!("invalid base64 image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_false_is_a_service_error() {
        let envelope: ExtractionEnvelope = serde_json::from_value(json!({
            "success": false,
            "error": "model overloaded"
        }))
        .unwrap();
        let err = envelope.into_result(AnnotationType::Table).unwrap_err();
        assert_eq!(err.user_message(), "model overloaded");
    }

    #[test]
    fn error_field_wins_over_success_flag() {
        let envelope: ExtractionEnvelope = serde_json::from_value(json!({
            "success": true,
            "result": {"title": "t", "description": "d", "html": ""},
            "error": "partial failure"
        }))
        .unwrap();
        assert!(matches!(
            envelope.into_result(AnnotationType::Table),
            Err(ServiceError::Service { status: 200, .. })
        ));
    }

    #[test]
    fn description_mentioning_error_is_not_a_failure() {
        let envelope: ExtractionEnvelope = serde_json::from_value(json!({
            "success": true,
            "result": {
                "diag_heading": "Tolerance stack",
                "diag_description": "Shows the error budget of the bore",
                "annotations": [{"marking": "Ø25", "description": "bore"}]
            }
        }))
        .unwrap();
        let AnnotationResult::Diagram(diagram) = envelope.into_result(AnnotationType::Diagram).unwrap()
        else {
            panic!("expected a diagram");
        };
        assert_eq!(diagram.heading, "Tolerance stack");
        assert_eq!(diagram.markings.len(), 1);
    }

    #[test]
    fn text_content_becomes_lines() {
        let envelope: ExtractionEnvelope = serde_json::from_value(json!({
            "success": true,
            "result": {"title": "Notes", "extracted_content": "1. DEBURR\n\n2. BREAK EDGES"}
        }))
        .unwrap();
        let AnnotationResult::Text(text) = envelope.into_result(AnnotationType::Text).unwrap() else {
            panic!("expected text");
        };
        let lines: Vec<_> = text.text_lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, ["1. DEBURR", "2. BREAK EDGES"]);
    }

    #[test]
    fn missing_result_is_malformed() {
        let envelope: ExtractionEnvelope =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(
            envelope.into_result(AnnotationType::Text),
            Err(ServiceError::Malformed(_))
        ));
    }

    #[test]
    fn processed_page_pairs_tables_and_html() {
        let wire: WireProcessedPage = serde_json::from_value(json!({
            "page": 3,
            "ocr_data": [{
                "text_lines": [{"text": "M8", "confidence": 0.93, "bbox": [1, 2, 30, 12]}],
                "languages": ["en"],
                "image_bbox": [0, 0, 850, 1100]
            }],
            "tables": {
                "bbox_data": [
                    {"class_id": 1, "xyxy": [10, 10, 200, 90], "xywh": [10, 10, 190, 80]},
                    {"class_id": 2, "xyxy": [10, 100, 200, 190]}
                ],
                "html": ["<table><tr><td>1</td></tr></table>"]
            }
        }))
        .unwrap();
        let page = ProcessedPage::from(wire);
        assert_eq!(page.page, 3);
        assert_eq!(page.ocr.text_lines[0].text, "M8");
        assert_eq!(page.ocr.image_bbox, Some(BBox::new(0.0, 0.0, 850.0, 1100.0)));
        assert_eq!(page.tables.len(), 2);
        assert_eq!(page.tables.detections()[0].class, TableClass::Tilted);
        assert!(page.tables.html_for(0).is_some());
        assert!(page.tables.html_for(1).is_none());
    }

    #[test]
    fn image_ocr_is_page_one() {
        let wire: WireImageOcr = serde_json::from_value(json!({
            "results": [{
                "text_lines": [{"text": "SECTION A-A", "confidence": 0.88, "bbox": [5, 5, 90, 20]}],
                "image_bbox": [0, 0, 640, 480]
            }],
            "tables": {"bbox_data": [{"class_id": 0, "xyxy": [100, 100, 300, 200]}], "html": []}
        }))
        .unwrap();
        let page = ProcessedPage::from(wire);
        assert_eq!(page.page, 1);
        assert_eq!(page.ocr.text_lines[0].text, "SECTION A-A");
        assert_eq!(page.tables.detections()[0].class, TableClass::Normal);
    }

    #[test]
    fn uploads_are_sniffed() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(DocumentFile::new("scan.png", png.to_vec()).kind, DocumentKind::Image);
        assert_eq!(
            DocumentFile::new("drawing.pdf", b"%PDF-1.7\n".to_vec()).kind,
            DocumentKind::Pdf
        );
    }

    #[test]
    fn data_url_decodes() {
        let bytes = decode_data_url("data:image/png;base64,AAEC").unwrap();
        assert_eq!(bytes, vec![0, 1, 2]);
        assert!(decode_data_url("data:image/png,raw").is_err());
    }
}
