//! OCR Module
//!
//! Data model for the results the page-processing service returns for a
//! page: recognized text lines (in OCR coordinate space) and detected tables
//! (in image space) with their HTML structure.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drawing_annotator::ocr::OcrPage;
//!
//! let boxes = page.line_boxes_in_image(natural_size);
//! page.edit_line(3, "Ø25 H7");
//! let pairs = page.text_edits();
//! ```

mod types;

pub use types::{OcrPage, TableClass, TableDetection, TableResults, TextEdit, TextLine};
