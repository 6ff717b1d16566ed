//! Drawing Annotator
//!
//! Server-side viewer for engineering drawings. A document is uploaded,
//! pages are sent to an OCR and table-detection backend, and the user
//! draws TEXT, TABLE and DIAGRAM regions over the page image that are
//! then extracted one by one.
//!
//! # Modules
//!
//! - `geometry`: boxes, points and the image/canvas/screen transforms
//! - `hit_test`: pointer target resolution
//! - `annotations`: annotation layer, gesture machine and batch extraction
//! - `fields`: named field parsing and normalization
//! - `document`: per-upload sessions and page selection parsing
//! - `render`: viewport rasterization, extraction crops and the frame cache
//! - `services`: the external document-processing backend
//! - `routes`: HTTP surface

pub mod annotations;
pub mod config;
pub mod document;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod hit_test;
pub mod ocr;
pub mod render;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
