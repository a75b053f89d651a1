//! Request schema and response-filename handling.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::OutputFormat;

/// OpenAPI shape of the `POST /process-document` multipart form. The handler
/// reads the fields straight off the multipart stream.
#[derive(Debug, utoipa::ToSchema)]
pub struct ProcessDocumentRequest {
    /// The .docx template containing `{{tag}}` placeholders.
    #[schema(value_type = String, format = Binary)]
    pub template: Vec<u8>,
    /// JSON object mapping tag names to values.
    pub json_data: String,
    /// Either `docx` (default) or `pdf`.
    pub output_format: Option<String>,
    /// Desired download filename; sanitized server-side.
    pub output_filename: Option<String>,
}

/// OpenAPI shape of the `POST /merge-pdf` multipart form.
#[derive(Debug, utoipa::ToSchema)]
pub struct MergePdfRequest {
    /// Two or more PDF files, merged in upload order.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub pdf_files: Vec<Vec<u8>>,
    /// Desired download filename; sanitized server-side.
    pub output_filename: Option<String>,
}

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Build the download filename for a rendered or converted document.
pub fn build_output_filename(requested: Option<&str>, format: OutputFormat) -> String {
    build_download_filename(requested, format.extension(), format.default_filename())
}

/// Build a safe download filename.
///
/// Any path components are stripped, unsafe characters collapse to `_`, and
/// the extension is forced to `ext`. Falls back to `default_name` when
/// nothing usable remains.
pub fn build_download_filename(requested: Option<&str>, ext: &str, default_name: &str) -> String {
    let requested = requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_name);

    let base = Path::new(requested)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let with_ext = if base.to_ascii_lowercase().ends_with(ext) {
        base.to_string()
    } else {
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        format!("{}{}", stem, ext)
    };

    let name = sanitize_filename::sanitize(&with_ext);
    let name = UNSAFE_CHARS.replace_all(&name, "_").into_owned();

    if name.is_empty() || name == ext || name == "." || name == ".." {
        default_name.to_string()
    } else {
        name
    }
}
