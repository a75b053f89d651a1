//! PDF merging.
//!
//! Combines two or more uploaded PDFs into a single document, in upload
//! order. Everything happens in memory; the merged page tree is rebuilt from
//! the inputs' pages and each input's own catalog is discarded.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};
use thiserror::Error;

/// Errors raised while merging PDFs.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("at least two PDF files are required, got {0}")]
    NotEnoughInputs(usize),
    #[error("'{0}' is not a PDF file")]
    NotAPdf(String),
    #[error("'{0}' is empty")]
    EmptyInput(String),
    #[error("'{0}' could not be read as a PDF: {1}")]
    InvalidPdf(String, #[source] lopdf::Error),
    #[error("'{0}' contains no pages")]
    NoPages(String),
    #[error("no page tree found across the inputs")]
    MissingPagesRoot,
    #[error("no document catalog found across the inputs")]
    MissingCatalog,
    #[error("failed to assemble the merged document: {0}")]
    Assemble(#[from] lopdf::Error),
}

/// One uploaded PDF, with the client-supplied filename kept for diagnostics.
pub struct MergeInput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Stateless merger for uploaded PDF files.
pub struct PdfMerger;

impl PdfMerger {
    /// Merge `inputs` into one PDF, pages in upload order.
    ///
    /// Every input must carry a `.pdf` filename, be non-empty, and parse as
    /// a PDF with at least one page.
    pub fn merge(inputs: &[MergeInput]) -> Result<Vec<u8>, MergeError> {
        if inputs.len() < 2 {
            return Err(MergeError::NotEnoughInputs(inputs.len()));
        }

        let mut merged = Document::with_version("1.5");
        let mut max_id = 1;
        let mut page_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
        let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for input in inputs {
            if !input.filename.to_ascii_lowercase().ends_with(".pdf") {
                return Err(MergeError::NotAPdf(input.filename.clone()));
            }
            if input.bytes.is_empty() {
                return Err(MergeError::EmptyInput(input.filename.clone()));
            }

            let mut doc = Document::load_mem(&input.bytes)
                .map_err(|e| MergeError::InvalidPdf(input.filename.clone(), e))?;
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            let pages = doc.get_pages();
            if pages.is_empty() {
                return Err(MergeError::NoPages(input.filename.clone()));
            }
            for (_, object_id) in pages {
                let object = doc
                    .get_object(object_id)
                    .map_err(|e| MergeError::InvalidPdf(input.filename.clone(), e))?
                    .to_owned();
                page_objects.insert(object_id, object);
            }
            all_objects.extend(doc.objects);
        }

        // Keep exactly one catalog and one pages root; fold the inputs'
        // pages dictionaries together and drop their outlines.
        let mut catalog_object: Option<(ObjectId, Object)> = None;
        let mut pages_object: Option<(ObjectId, Object)> = None;

        for (object_id, object) in all_objects.iter() {
            match object.type_name().unwrap_or("") {
                "Catalog" => {
                    let id = catalog_object.as_ref().map(|(id, _)| *id).unwrap_or(*object_id);
                    catalog_object = Some((id, object.clone()));
                }
                "Pages" => {
                    if let Ok(dictionary) = object.as_dict() {
                        let mut dictionary = dictionary.clone();
                        if let Some((_, existing)) = &pages_object {
                            if let Ok(existing) = existing.as_dict() {
                                dictionary.extend(existing);
                            }
                        }
                        let id = pages_object.as_ref().map(|(id, _)| *id).unwrap_or(*object_id);
                        pages_object = Some((id, Object::Dictionary(dictionary)));
                    }
                }
                "Page" | "Outlines" | "Outline" => {}
                _ => {
                    merged.objects.insert(*object_id, object.clone());
                }
            }
        }

        let (pages_id, pages_root) = pages_object.ok_or(MergeError::MissingPagesRoot)?;
        let (catalog_id, catalog_root) = catalog_object.ok_or(MergeError::MissingCatalog)?;

        for (object_id, object) in page_objects.iter() {
            if let Ok(dictionary) = object.as_dict() {
                let mut dictionary = dictionary.clone();
                dictionary.set("Parent", pages_id);
                merged.objects.insert(*object_id, Object::Dictionary(dictionary));
            }
        }

        if let Ok(dictionary) = pages_root.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Count", page_objects.len() as i64);
            dictionary.set(
                "Kids",
                page_objects
                    .keys()
                    .map(|id| Object::Reference(*id))
                    .collect::<Vec<_>>(),
            );
            merged.objects.insert(pages_id, Object::Dictionary(dictionary));
        }

        if let Ok(dictionary) = catalog_root.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Pages", pages_id);
            dictionary.remove(b"Outlines");
            merged.objects.insert(catalog_id, Object::Dictionary(dictionary));
        }

        merged.trailer.set("Root", catalog_id);
        merged.max_id = merged.objects.len() as u32;
        merged.renumber_objects();
        merged.compress();

        let mut bytes = Vec::new();
        merged.save_to(&mut bytes).map_err(lopdf::Error::from)?;
        Ok(bytes)
    }
}
