//! Template rendering - fills `{{tag}}` placeholders in a docx with JSON data.
//!
//! A docx is a zip archive; the textual content lives in `word/*.xml` parts.
//! Rendering normalizes tags Word has split across runs, then substitutes
//! each tag with the matching value from the payload.

pub mod docx;
pub mod normalize;

pub use docx::{DocxRenderer, RenderedTemplate};
pub use normalize::{detect_tags, normalize_fragmented_tags};

use thiserror::Error;

/// Errors raised while filling a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is not a valid docx archive: {0}")]
    InvalidTemplate(String),
    #[error("failed to rebuild the document archive: {0}")]
    Archive(#[source] std::io::Error),
    #[error("no value supplied for tag '{0}'")]
    MissingKey(String),
    #[error("value for tag '{0}' is not a scalar")]
    UnsupportedValue(String),
}
