//! OCR and table detection results
//!
//! Results arrive from the page-processing service and are inert data for
//! the viewer. The only mutable part is the `edited_text` overlay a user can
//! put on top of a recognized line.

use serde::{Deserialize, Serialize};

use crate::geometry::{ocr_to_image, BBox, Point, Size};

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    /// OCR ground truth; never overwritten.
    pub text: String,
    /// User correction, authoritative for display and export when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_text: Option<String>,
    /// Recognition confidence in [0, 1].
    pub confidence: f64,
    /// Box in OCR coordinate space.
    pub bbox: BBox,
    /// Optional quadrilateral in OCR coordinate space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
}

impl TextLine {
    pub fn new(text: impl Into<String>, confidence: f64, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            edited_text: None,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
            polygon: None,
        }
    }

    /// The value shown to the user and used by save/export.
    pub fn display_text(&self) -> &str {
        self.edited_text.as_deref().unwrap_or(&self.text)
    }

    pub fn is_edited(&self) -> bool {
        self.edited_text.is_some()
    }
}

/// (original, edited) pair sent to the text-edit persistence service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEdit {
    pub original: String,
    pub edited: String,
}

/// OCR output for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrPage {
    pub text_lines: Vec<TextLine>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Reference frame the OCR engine worked in, if it differs from the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_bbox: Option<BBox>,
}

impl OcrPage {
    /// Line boxes mapped from OCR space into image space.
    pub fn line_boxes_in_image(&self, natural: Size) -> Vec<BBox> {
        let transform = ocr_to_image(self.image_bbox, natural);
        self.text_lines
            .iter()
            .map(|line| line.bbox.map(&transform))
            .collect()
    }

    /// Put a correction over line `index`. Returns `false` for a bad index.
    ///
    /// Writing the original text back removes the overlay.
    pub fn edit_line(&mut self, index: usize, text: impl Into<String>) -> bool {
        let Some(line) = self.text_lines.get_mut(index) else {
            return false;
        };
        let text = text.into();
        line.edited_text = if text == line.text { None } else { Some(text) };
        true
    }

    /// Full (original, displayed) pair list for the page.
    pub fn text_edits(&self) -> Vec<TextEdit> {
        self.text_lines
            .iter()
            .map(|line| TextEdit {
                original: line.text.clone(),
                edited: line.display_text().to_string(),
            })
            .collect()
    }

    pub fn edited_count(&self) -> usize {
        self.text_lines.iter().filter(|line| line.is_edited()).count()
    }
}

/// Table detector class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableClass {
    #[default]
    Normal,
    Tilted,
    Empty,
}

impl TableClass {
    /// Map the detector's numeric class id; unknown ids count as normal tables.
    pub fn from_class_id(class_id: i64) -> Self {
        match class_id {
            1 => Self::Tilted,
            2 => Self::Empty,
            _ => Self::Normal,
        }
    }
}

/// One detected table, in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableDetection {
    pub bbox: BBox,
    pub class: TableClass,
}

/// Table boxes plus their index-parallel HTML fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableResults {
    detections: Vec<TableDetection>,
    html: Vec<Option<String>>,
}

impl TableResults {
    /// Pair detections with fragments by index.
    ///
    /// Missing fragments become `None`; surplus fragments have no box to
    /// belong to and are dropped.
    pub fn new(detections: Vec<TableDetection>, html: Vec<String>) -> Self {
        if html.len() > detections.len() {
            tracing::warn!(
                boxes = detections.len(),
                fragments = html.len(),
                "More table HTML fragments than detected boxes, dropping the surplus"
            );
        }
        let mut fragments = html.into_iter();
        let html = detections
            .iter()
            .map(|_| fragments.next().filter(|fragment| !fragment.trim().is_empty()))
            .collect();
        Self { detections, html }
    }

    pub fn detections(&self) -> &[TableDetection] {
        &self.detections
    }

    /// HTML for table `index`; `None` means no structure was recognized.
    pub fn html_for(&self, index: usize) -> Option<&str> {
        self.html.get(index).and_then(|fragment| fragment.as_deref())
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edited_text_takes_precedence() {
        let mut page = OcrPage {
            text_lines: vec![TextLine::new("abc", 0.9, BBox::new(0.0, 0.0, 10.0, 5.0))],
            ..Default::default()
        };
        assert!(page.edit_line(0, "abd"));

        let line = &page.text_lines[0];
        assert_eq!(line.text, "abc");
        assert_eq!(line.display_text(), "abd");
        assert_eq!(
            page.text_edits(),
            vec![TextEdit {
                original: "abc".to_string(),
                edited: "abd".to_string(),
            }]
        );
    }

    #[test]
    fn restoring_original_text_clears_overlay() {
        let mut page = OcrPage {
            text_lines: vec![TextLine::new("abc", 0.9, BBox::new(0.0, 0.0, 10.0, 5.0))],
            ..Default::default()
        };
        page.edit_line(0, "xyz");
        page.edit_line(0, "abc");
        assert_eq!(page.edited_count(), 0);
        assert!(!page.edit_line(3, "nope"));
    }

    #[test]
    fn line_boxes_follow_reference_frame() {
        let page = OcrPage {
            text_lines: vec![TextLine::new("a", 1.0, BBox::new(10.0, 10.0, 20.0, 20.0))],
            languages: vec!["en".to_string()],
            image_bbox: Some(BBox::new(0.0, 0.0, 100.0, 100.0)),
        };
        let boxes = page.line_boxes_in_image(Size::new(200.0, 300.0));
        assert_eq!(boxes[0].to_xyxy(), [20.0, 30.0, 40.0, 60.0]);
    }

    #[test]
    fn missing_html_fragment_is_not_an_error() {
        let detections = vec![
            TableDetection {
                bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
                class: TableClass::Normal,
            },
            TableDetection {
                bbox: BBox::new(20.0, 20.0, 40.0, 40.0),
                class: TableClass::from_class_id(1),
            },
        ];
        let tables = TableResults::new(detections, vec!["<table></table>".to_string()]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables.html_for(0), Some("<table></table>"));
        assert_eq!(tables.html_for(1), None);
        assert_eq!(tables.detections()[1].class, TableClass::Tilted);
    }
}
