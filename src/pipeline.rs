//! Request pipeline orchestrator.
//!
//! Sequences validation -> render -> convert -> respond for one request and
//! owns both the error taxonomy and the cleanup ordering. This is the only
//! place where internal failure kinds map to HTTP statuses.

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::info;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ServerConfig;
use crate::convert::{ConvertError, Converter};
use crate::merge::{MergeError, MergeInput, PdfMerger};
use crate::render::{DocxRenderer, TemplateError};
use crate::workspace::Workspace;
use crate::ErrorResponse;

/// How much larger than the upload cap a template may grow once its zip
/// entries are decompressed. XML parts compress extremely well, so a real
/// template stays far below this; only hostile archives hit it.
const MAX_INFLATION_RATIO: usize = 10;

/// One inbound rendering request.
pub struct RenderRequest {
    pub template: Vec<u8>,
    pub json_data: String,
}

/// Requested output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Docx,
    Pdf,
}

impl OutputFormat {
    /// Parse the `output_format` form field. Absent means docx, anything
    /// other than `docx`/`pdf` is a client error.
    pub fn parse(field: Option<&str>) -> Result<Self, PipelineError> {
        match field.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("docx") => Ok(Self::Docx),
            Some("pdf") => Ok(Self::Pdf),
            Some(other) => Err(PipelineError::InvalidInput(format!(
                "unsupported output_format '{}', expected 'docx' or 'pdf'",
                other
            ))),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => ".docx",
            Self::Pdf => ".pdf",
        }
    }

    pub fn default_filename(&self) -> &'static str {
        match self {
            Self::Docx => "result.docx",
            Self::Pdf => "result.pdf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

/// The rendered (and possibly converted) artifact returned to the caller.
#[derive(Debug)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

/// Failure taxonomy for one request, every stage included.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("workspace error: {0}")]
    Workspace(#[source] std::io::Error),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl PipelineError {
    /// Pipeline stage the failure belongs to, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "validation",
            Self::Template(_) => "render",
            Self::Workspace(_) => "workspace",
            Self::Convert(_) => "conversion",
            Self::Merge(_) => "merge",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Template(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Convert(ConvertError::EngineUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Convert(ConvertError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Convert(_) | Self::Workspace(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Merge(MergeError::Assemble(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Merge(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match status {
            StatusCode::BAD_REQUEST => "BadRequest",
            StatusCode::UNPROCESSABLE_ENTITY => "TemplateError",
            StatusCode::SERVICE_UNAVAILABLE => "EngineUnavailable",
            StatusCode::GATEWAY_TIMEOUT => "ConversionTimeout",
            _ => "InternalServerError",
        };
        HttpResponse::build(status).json(ErrorResponse::new(error_type, &self.to_string()))
    }
}

/// Orchestrates the full render/convert sequence for one request.
pub struct RenderPipeline {
    converter: Arc<dyn Converter>,
    renderer: DocxRenderer,
    scratch_root: PathBuf,
    max_template_bytes: usize,
}

impl RenderPipeline {
    pub fn new(config: &ServerConfig, converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            renderer: DocxRenderer::new(
                config.max_template_bytes.saturating_mul(MAX_INFLATION_RATIO),
            ),
            scratch_root: config.scratch_root.clone(),
            max_template_bytes: config.max_template_bytes,
        }
    }

    /// Run one request end to end.
    ///
    /// Validation and rendering happen entirely in memory; a workspace only
    /// exists around the conversion stage, and once acquired it is released
    /// on every path before this returns.
    pub async fn handle(
        &self,
        request: RenderRequest,
        format: OutputFormat,
    ) -> Result<RenderedArtifact, PipelineError> {
        if request.template.is_empty() {
            return Err(PipelineError::InvalidInput(
                "template file is empty".to_string(),
            ));
        }
        if request.template.len() > self.max_template_bytes {
            return Err(PipelineError::InvalidInput(format!(
                "template exceeds the maximum size of {} bytes",
                self.max_template_bytes
            )));
        }
        let data = parse_payload(&request.json_data)?;

        let rendered = self.renderer.render(&request.template, &data)?;
        if rendered.tags.is_empty() {
            info!("no {{{{...}}}} tags detected in template");
        } else {
            info!("tags detected in template: {:?}", rendered.tags);
        }

        if format == OutputFormat::Docx {
            return Ok(RenderedArtifact {
                bytes: rendered.bytes,
                format,
            });
        }

        let mut workspace =
            Workspace::acquire(&self.scratch_root).map_err(PipelineError::Workspace)?;
        let result = self.convert(&rendered.bytes, &workspace).await;
        workspace.release();
        result.map(|bytes| RenderedArtifact { bytes, format })
    }

    async fn convert(
        &self,
        rendered: &[u8],
        workspace: &Workspace,
    ) -> Result<Vec<u8>, PipelineError> {
        let input = workspace
            .write_input(rendered)
            .map_err(PipelineError::Workspace)?;
        let pdf_path = self
            .converter
            .convert_to_pdf(&input, workspace.dir())
            .await?;
        workspace
            .read_file(&pdf_path)
            .map_err(PipelineError::Workspace)
    }

    /// Merge uploaded PDFs into one document, pages in upload order.
    pub fn merge(&self, inputs: &[MergeInput]) -> Result<Vec<u8>, PipelineError> {
        let merged = PdfMerger::merge(inputs)?;
        info!("merged {} PDFs ({} bytes)", inputs.len(), merged.len());
        Ok(merged)
    }
}

/// Parse `json_data` into a substitution mapping. Must be a JSON object.
fn parse_payload(json_data: &str) -> Result<Map<String, Value>, PipelineError> {
    let value: Value = serde_json::from_str(json_data)
        .map_err(|e| PipelineError::InvalidInput(format!("json_data is not valid JSON: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(PipelineError::InvalidInput(
            "json_data must be a JSON object mapping tag names to values".to_string(),
        )),
    }
}
