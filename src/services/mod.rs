//! External services
//!
//! OCR, table detection, page rasterization and AI extraction all live in a
//! separate backend reached over HTTP. The viewer depends only on the
//! [`DocumentServices`] trait.

mod provider;
mod types;

#[cfg(test)]
pub use provider::mock;
pub use provider::{DocumentServices, HttpDocumentServices};
pub use types::{
    decode_data_url, DocumentFile, DocumentInfo, DocumentKind, ExtractionEnvelope,
    ExtractionRequest, ProcessedPage, ServiceError,
};
