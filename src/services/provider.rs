//! Service providers
//!
//! Defines the trait the viewer talks to and the HTTP implementation that
//! reaches the document-processing backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::annotations::AnnotationResult;
use crate::config::ServicesConfig;
use crate::fields::FieldSpec;
use crate::ocr::{TableDetection, TextEdit};

use super::types::{
    decode_data_url, DocumentFile, DocumentInfo, ExtractionEnvelope, ExtractionRequest,
    ProcessedPage, ServiceError, WireDetectedTables, WireErrorBody, WireFieldAnswer,
    WireFieldRequest, WireImageOcr, WirePageImage, WireProcessResponse, WireTextEdits,
};

/// External collaborators of the viewer
#[async_trait]
pub trait DocumentServices: Send + Sync {
    /// Page count and file name of an uploaded document.
    async fn document_info(&self, document: &DocumentFile) -> Result<DocumentInfo, ServiceError>;

    /// Run OCR and table detection on the selected pages.
    async fn process_pages(
        &self,
        document: &DocumentFile,
        page_selection: &str,
    ) -> Result<Vec<ProcessedPage>, ServiceError>;

    /// Encoded raster (PNG) of one page.
    async fn page_image(&self, document: &DocumentFile, page: u32) -> Result<Vec<u8>, ServiceError>;

    /// Candidate table boxes on one page, in image pixels.
    async fn detect_tables(
        &self,
        document: &DocumentFile,
        page: u32,
    ) -> Result<Vec<TableDetection>, ServiceError>;

    /// Extract the content of one annotation crop.
    async fn extract_annotation(
        &self,
        request: &ExtractionRequest,
    ) -> Result<AnnotationResult, ServiceError>;

    /// Persist the full list of (original, edited) line pairs for a page.
    async fn save_text_edits(&self, page: u32, edits: &[TextEdit]) -> Result<(), ServiceError>;

    /// Ask for `fields` in `content`. The answer is raw
    /// `name: value (Confidence: c)` lines.
    async fn extract_fields(&self, content: &str, fields: &[FieldSpec]) -> Result<String, ServiceError>;
}

/// HTTP client for the document-processing backend
pub struct HttpDocumentServices {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentServices {
    pub fn new(config: &ServicesConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn file_part(document: &DocumentFile) -> Part {
        Part::stream(document.bytes.clone()).file_name(document.file_name.clone())
    }

    fn single_page(document: &DocumentFile, page: u32) -> Result<(), ServiceError> {
        if page != 1 {
            return Err(ServiceError::Service {
                status: 404,
                message: format!("{} has a single page", document.file_name),
            });
        }
        Ok(())
    }

    /// Send a request and decode a JSON body, mapping non-2xx to `Service`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "Service request failed");
            ServiceError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorBody>(&body)
                .ok()
                .and_then(WireErrorBody::into_message)
                .unwrap_or(body);
            tracing::warn!(endpoint, status = status.as_u16(), %message, "Service returned an error");
            return Err(ServiceError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "Failed to decode service response");
            ServiceError::Malformed(e.to_string())
        })
    }
}

#[async_trait]
impl DocumentServices for HttpDocumentServices {
    async fn document_info(&self, document: &DocumentFile) -> Result<DocumentInfo, ServiceError> {
        if document.is_image() {
            return Ok(DocumentInfo {
                total_pages: 1,
                file_name: document.file_name.clone(),
            });
        }
        tracing::debug!(file_name = %document.file_name, "Requesting document info");
        let form = Form::new().part("file", Self::file_part(document));
        self.send_json("pdf-info", self.client.post(self.url("pdf-info")).multipart(form))
            .await
    }

    async fn process_pages(
        &self,
        document: &DocumentFile,
        page_selection: &str,
    ) -> Result<Vec<ProcessedPage>, ServiceError> {
        if document.is_image() {
            tracing::info!(file_name = %document.file_name, "Processing image");
            let form = Form::new().part("file", Self::file_part(document));
            let response: WireImageOcr = self
                .send_json("ocr", self.client.post(self.url("ocr")).multipart(form))
                .await?;
            return Ok(vec![ProcessedPage::from(response)]);
        }
        tracing::info!(file_name = %document.file_name, page_selection, "Processing pages");
        let form = Form::new()
            .part("file", Self::file_part(document))
            .text("page_selection", page_selection.to_string());
        let response: WireProcessResponse = self
            .send_json("process-pdf", self.client.post(self.url("process-pdf")).multipart(form))
            .await?;
        Ok(response
            .processed_pages
            .into_iter()
            .map(ProcessedPage::from)
            .collect())
    }

    async fn page_image(&self, document: &DocumentFile, page: u32) -> Result<Vec<u8>, ServiceError> {
        if document.is_image() {
            Self::single_page(document, page)?;
            return Ok(document.bytes.to_vec());
        }
        tracing::debug!(file_name = %document.file_name, page, "Requesting page image");
        let form = Form::new()
            .part("file", Self::file_part(document))
            .text("page", page.to_string());
        let response: WirePageImage = self
            .send_json(
                "get-page-image",
                self.client.post(self.url("get-page-image")).multipart(form),
            )
            .await?;
        decode_data_url(&response.image)
    }

    async fn detect_tables(
        &self,
        document: &DocumentFile,
        page: u32,
    ) -> Result<Vec<TableDetection>, ServiceError> {
        tracing::debug!(file_name = %document.file_name, page, "Detecting tables");
        let response: WireDetectedTables = if document.is_image() {
            Self::single_page(document, page)?;
            let form = Form::new()
                .part("file", Self::file_part(document))
                .text("file_name", document.file_name.clone())
                .text("page_num", "1");
            self.send_json("extract-tables", self.client.post(self.url("extract-tables")).multipart(form))
                .await?
        } else {
            let form = Form::new()
                .part("file", Self::file_part(document))
                .text("page", page.to_string());
            self.send_json("detect-tables", self.client.post(self.url("detect-tables")).multipart(form))
                .await?
        };
        Ok(response
            .bbox_data
            .into_iter()
            .map(TableDetection::from)
            .collect())
    }

    async fn extract_annotation(
        &self,
        request: &ExtractionRequest,
    ) -> Result<AnnotationResult, ServiceError> {
        let bbox = serde_json::to_string(&request.bbox)
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        let crop = Part::bytes(request.image_png.clone())
            .file_name(format!("{}.png", request.annotation_id))
            .mime_str("image/png")
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("file", crop)
            .text("annotation_id", request.annotation_id.to_string())
            .text("type", request.annotation_type.as_str())
            .text("bbox", bbox)
            .text("rotation", request.rotation.degrees().to_string());

        let envelope: ExtractionEnvelope = self
            .send_json(
                "process-annotation",
                self.client.post(self.url("process-annotation")).multipart(form),
            )
            .await?;
        envelope.into_result(request.annotation_type)
    }

    async fn save_text_edits(&self, page: u32, edits: &[TextEdit]) -> Result<(), ServiceError> {
        tracing::info!(page, lines = edits.len(), "Saving text edits");
        let body = WireTextEdits { page, edits };
        let _: serde_json::Value = self
            .send_json(
                "save-text-edits",
                self.client.post(self.url("save-text-edits")).json(&body),
            )
            .await?;
        Ok(())
    }

    async fn extract_fields(&self, content: &str, fields: &[FieldSpec]) -> Result<String, ServiceError> {
        tracing::info!(fields = fields.len(), chars = content.len(), "Extracting fields");
        let body = WireFieldRequest {
            content,
            fields: fields
                .iter()
                .map(|field| (field.name.as_str(), field.described()))
                .collect(),
        };
        let answer: WireFieldAnswer = self
            .send_json(
                "extract-fields",
                self.client.post(self.url("extract-fields")).json(&body),
            )
            .await?;
        Ok(answer.response)
    }
}
