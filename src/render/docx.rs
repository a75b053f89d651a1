//! Docx substitution engine.
//!
//! Pure byte transformation: template bytes plus a JSON object in, filled
//! document bytes out. No filesystem access and no state between calls.

use std::io::{Cursor, Read, Write};

use serde_json::{Map, Value};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::normalize::{detect_tags, normalize_fragmented_tags, CONTIGUOUS_TAG};
use super::TemplateError;

/// Result of filling a template.
#[derive(Debug)]
pub struct RenderedTemplate {
    pub bytes: Vec<u8>,
    /// Tag names found in the template, for request logging.
    pub tags: Vec<String>,
}

/// Renderer for docx templates with `{{tag}}` placeholders, bounded by a
/// total decompressed-size ceiling.
pub struct DocxRenderer {
    max_inflated_bytes: usize,
}

impl DocxRenderer {
    /// `max_inflated_bytes` caps the total decompressed size of the archive.
    pub fn new(max_inflated_bytes: usize) -> Self {
        Self { max_inflated_bytes }
    }

    /// Fill every placeholder in `template` with values from `data`.
    ///
    /// Tags resolve against the payload by name, with dotted segments
    /// traversing nested objects (`{{client.nom}}`). A tag without a
    /// matching key is an error; templates are never silently blanked.
    pub fn render(
        &self,
        template: &[u8],
        data: &Map<String, Value>,
    ) -> Result<RenderedTemplate, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(template))
            .map_err(|e| TemplateError::InvalidTemplate(e.to_string()))?;

        let mut out = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut tags = Vec::new();
        let mut inflated_total = 0usize;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| TemplateError::InvalidTemplate(e.to_string()))?;
            let name = entry.name().to_string();

            // Sizes declared in the archive headers cannot be trusted, so
            // the decompressed read itself is capped rather than
            // preallocating from the header.
            let remaining = (self.max_inflated_bytes - inflated_total) as u64;
            let mut bytes = Vec::new();
            (&mut entry)
                .take(remaining + 1)
                .read_to_end(&mut bytes)
                .map_err(TemplateError::Archive)?;
            if bytes.len() as u64 > remaining {
                return Err(TemplateError::InvalidTemplate(format!(
                    "decompressed content exceeds the {} byte limit",
                    self.max_inflated_bytes
                )));
            }
            inflated_total += bytes.len();

            if name.starts_with("word/") && name.ends_with(".xml") {
                let xml = String::from_utf8_lossy(&bytes).into_owned();
                let xml = normalize_fragmented_tags(&xml);
                for tag in detect_tags(&xml) {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                bytes = substitute(&xml, data)?.into_bytes();
            }

            out.start_file(name, options).map_err(zip_to_io)?;
            out.write_all(&bytes).map_err(TemplateError::Archive)?;
        }

        let cursor = out.finish().map_err(zip_to_io)?;
        Ok(RenderedTemplate {
            bytes: cursor.into_inner(),
            tags,
        })
    }
}

fn zip_to_io(e: zip::result::ZipError) -> TemplateError {
    TemplateError::Archive(std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Replace every contiguous `{{tag}}` in an XML part.
fn substitute(xml: &str, data: &Map<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(xml.len());
    let mut last = 0;
    for caps in CONTIGUOUS_TAG.captures_iter(xml) {
        let whole = caps.get(0).unwrap();
        let tag = &caps[1];
        let value = resolve_tag(data, tag)?;
        out.push_str(&xml[last..whole.start()]);
        out.push_str(&xml_escape(&value));
        last = whole.end();
    }
    out.push_str(&xml[last..]);
    Ok(out)
}

/// Resolve a tag name, possibly dotted, to its scalar rendering.
fn resolve_tag(data: &Map<String, Value>, tag: &str) -> Result<String, TemplateError> {
    let mut current = None;
    let mut object = Some(data);
    for segment in tag.split('.') {
        let value = object
            .and_then(|o| o.get(segment))
            .ok_or_else(|| TemplateError::MissingKey(tag.to_string()))?;
        object = value.as_object();
        current = Some(value);
    }

    match current {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) => Ok(String::new()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            Err(TemplateError::UnsupportedValue(tag.to_string()))
        }
        None => Err(TemplateError::MissingKey(tag.to_string())),
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
