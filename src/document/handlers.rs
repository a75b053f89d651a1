//! HTTP handlers for document processing.

use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, Responder};
use lazy_static::lazy_static;
use log::{error, info, warn};
use prometheus::{register_int_counter_vec, IntCounterVec};
use uuid::Uuid;

use crate::document::models::{
    build_download_filename, build_output_filename, MergePdfRequest, ProcessDocumentRequest,
};
use crate::document::multipart::{MergeMultipartParser, ProcessMultipartParser};
use crate::merge::MergeInput;
use crate::pipeline::{OutputFormat, RenderRequest};
use crate::state::AppState;
use crate::ErrorResponse;

lazy_static! {
    static ref DOCUMENTS_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "docproc_documents_processed_total",
        "Documents processed, by output format and outcome.",
        &["format", "outcome"]
    )
    .expect("failed to register documents counter");
}

#[utoipa::path(
    tag = "Document Processing",
    post,
    path = "/process-document",
    request_body(content = inline(ProcessDocumentRequest), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Rendered document or converted PDF as a binary attachment"),
        (status = 400, description = "Malformed request (bad JSON, empty or oversized template)", body = ErrorResponse),
        (status = 422, description = "Template/tag mismatch", body = ErrorResponse),
        (status = 500, description = "Conversion failed", body = ErrorResponse),
        (status = 503, description = "Conversion engine unavailable", body = ErrorResponse),
        (status = 504, description = "Conversion timed out", body = ErrorResponse)
    )
)]
pub async fn process_document(payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!("[{}] processing document request", request_id);

    let parsed = match ProcessMultipartParser::parse(payload).await {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("[{}] multipart parsing failed: {}", request_id, e);
            return HttpResponse::from(e);
        }
    };

    let format = match OutputFormat::parse(parsed.output_format.as_deref()) {
        Ok(format) => format,
        Err(e) => {
            warn!("[{}] {}", request_id, e);
            return e.to_response();
        }
    };
    info!(
        "[{}] template '{}' ({} bytes), output format {}",
        request_id,
        parsed.template_filename,
        parsed.template.len(),
        format.as_str()
    );

    let request = RenderRequest {
        template: parsed.template,
        json_data: parsed.json_data,
    };

    match data.pipeline.handle(request, format).await {
        Ok(artifact) => {
            let filename =
                build_output_filename(parsed.output_filename.as_deref(), artifact.format);
            DOCUMENTS_PROCESSED
                .with_label_values(&[format.as_str(), "success"])
                .inc();
            info!(
                "[{}] done, returning '{}' ({} bytes)",
                request_id,
                filename,
                artifact.bytes.len()
            );
            HttpResponse::Ok()
                .content_type(artifact.format.media_type())
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(filename)],
                })
                .body(artifact.bytes)
        }
        Err(e) => {
            error!(
                "[{}] pipeline failed at stage '{}': {}",
                request_id,
                e.stage(),
                e
            );
            DOCUMENTS_PROCESSED
                .with_label_values(&[format.as_str(), "failure"])
                .inc();
            e.to_response()
        }
    }
}

#[utoipa::path(
    tag = "Document Processing",
    post,
    path = "/merge-pdf",
    request_body(content = inline(MergePdfRequest), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Merged PDF as a binary attachment"),
        (status = 400, description = "Fewer than two PDFs, or an input is not a usable PDF", body = ErrorResponse),
        (status = 500, description = "Merge failed", body = ErrorResponse)
    )
)]
pub async fn merge_pdf(payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!("[{}] processing PDF merge request", request_id);

    let parsed = match MergeMultipartParser::parse(payload).await {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("[{}] multipart parsing failed: {}", request_id, e);
            return HttpResponse::from(e);
        }
    };
    info!("[{}] {} PDF files uploaded", request_id, parsed.files.len());

    let inputs: Vec<MergeInput> = parsed
        .files
        .into_iter()
        .map(|(filename, bytes)| MergeInput { filename, bytes })
        .collect();

    match data.pipeline.merge(&inputs) {
        Ok(bytes) => {
            let filename =
                build_download_filename(parsed.output_filename.as_deref(), ".pdf", "merged.pdf");
            DOCUMENTS_PROCESSED
                .with_label_values(&["merge", "success"])
                .inc();
            info!(
                "[{}] done, returning '{}' ({} bytes)",
                request_id,
                filename,
                bytes.len()
            );
            HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(filename)],
                })
                .body(bytes)
        }
        Err(e) => {
            error!(
                "[{}] pipeline failed at stage '{}': {}",
                request_id,
                e.stage(),
                e
            );
            DOCUMENTS_PROCESSED
                .with_label_values(&["merge", "failure"])
                .inc();
            e.to_response()
        }
    }
}

#[utoipa::path(
    tag = "Document Processing",
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner")
    )
)]
pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Docx template rendering and PDF conversion service"
    }))
}
