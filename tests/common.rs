//! Shared test helpers: in-memory docx builders and mock converters.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docproc_server::convert::{ConvertError, Converter};
use lopdf::{dictionary, Document, Object};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

/// Build a minimal docx whose body is the given raw WordprocessingML XML.
pub fn make_docx_from_xml(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body_xml
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(CONTENT_TYPES_XML.as_bytes()).unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Build a minimal docx containing one paragraph of plain text.
pub fn make_docx(text: &str) -> Vec<u8> {
    make_docx_from_xml(&format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text))
}

/// Extract `word/document.xml` from docx bytes.
pub fn read_document_xml(docx: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut entry = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    xml
}

/// Build a minimal PDF with the given number of empty pages.
pub fn make_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..page_count {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Page count of PDF bytes.
pub fn pdf_page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

/// Converter that always produces a fixed, valid-looking PDF.
pub struct MockConverter;

#[async_trait]
impl Converter for MockConverter {
    async fn convert_to_pdf(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        let stem = input.file_stem().unwrap().to_string_lossy();
        let path = output_dir.join(format!("{}.pdf", stem));
        std::fs::write(&path, b"%PDF-1.4 mock conversion")?;
        Ok(path)
    }
}

/// Converter that fails with the error produced by the given constructor.
pub struct FailingConverter(pub fn() -> ConvertError);

#[async_trait]
impl Converter for FailingConverter {
    async fn convert_to_pdf(
        &self,
        _input: &Path,
        _output_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        Err((self.0)())
    }
}
