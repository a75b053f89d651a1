//! Multipart parsing for the document-processing endpoint.

use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use sanitize_filename::sanitize;

use crate::ErrorResponse;

/// Fields extracted from one `POST /process-document` form.
#[derive(Debug)]
pub struct ParsedProcessRequest {
    pub template: Vec<u8>,
    pub template_filename: String,
    pub json_data: String,
    pub output_format: Option<String>,
    pub output_filename: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::MissingField(_) | MultipartParseError::Utf8Error(_) => {
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!("{}", error)))
            }
            _ => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("{}", error))),
        }
    }
}

pub struct ProcessMultipartParser;

impl ProcessMultipartParser {
    pub async fn parse(
        mut multipart: Multipart,
    ) -> Result<ParsedProcessRequest, MultipartParseError> {
        let mut template: Option<Vec<u8>> = None;
        let mut template_filename = String::new();
        let mut json_data: Option<String> = None;
        let mut output_format: Option<String> = None;
        let mut output_filename: Option<String> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(|s| s.to_string());

            let mut buffer = Vec::new();
            while let Some(chunk) = field.next().await {
                let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                buffer.extend_from_slice(&data_chunk);
            }

            match name.as_str() {
                "template" => {
                    template_filename = maybe_filename
                        .map(|f| sanitize(&f))
                        .unwrap_or_else(|| "template.docx".to_string());
                    template = Some(buffer);
                }
                "json_data" => {
                    json_data = Some(text_field(buffer)?);
                }
                "output_format" => {
                    output_format = Some(text_field(buffer)?);
                }
                "output_filename" => {
                    output_filename = Some(text_field(buffer)?);
                }
                _ => continue,
            }
        }

        let template = template.ok_or(MultipartParseError::MissingField("template"))?;
        let json_data = json_data.ok_or(MultipartParseError::MissingField("json_data"))?;

        Ok(ParsedProcessRequest {
            template,
            template_filename,
            json_data,
            output_format,
            output_filename,
        })
    }
}

/// Fields extracted from one `POST /merge-pdf` form.
#[derive(Debug)]
pub struct ParsedMergeRequest {
    /// Uploaded PDFs as `(filename, bytes)`, in upload order.
    pub files: Vec<(String, Vec<u8>)>,
    pub output_filename: Option<String>,
}

pub struct MergeMultipartParser;

impl MergeMultipartParser {
    pub async fn parse(
        mut multipart: Multipart,
    ) -> Result<ParsedMergeRequest, MultipartParseError> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        let mut output_filename: Option<String> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(|s| s.to_string());

            let mut buffer = Vec::new();
            while let Some(chunk) = field.next().await {
                let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                buffer.extend_from_slice(&data_chunk);
            }

            match name.as_str() {
                // Clients disagree on the field name for repeated uploads,
                // so the common spellings are all accepted.
                "pdf_files" | "pdf_files[]" | "file" | "files" => {
                    let filename = maybe_filename.map(|f| sanitize(&f)).unwrap_or_default();
                    files.push((filename, buffer));
                }
                "output_filename" => {
                    output_filename = Some(text_field(buffer)?);
                }
                _ => continue,
            }
        }

        Ok(ParsedMergeRequest {
            files,
            output_filename,
        })
    }
}

fn text_field(buffer: Vec<u8>) -> Result<String, MultipartParseError> {
    String::from_utf8(buffer).map_err(|e| MultipartParseError::Utf8Error(e.to_string()))
}
