//! Fragmented-tag normalization and tag detection.
//!
//! Word editors routinely split a `{{nom}}` token across several runs, e.g.
//! `{<w:t>{</w:t><w:t>nom</w:t><w:t>}</w:t>}`, which would defeat naive
//! substitution. The normalizer reconstructs contiguous tags inside an XML
//! part before rendering. Only fragments whose inner text cleans up to a
//! valid variable name are rewritten; anything else is left untouched.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// `{{` ... `}}` with arbitrary XML markup or whitespace between the
    /// braces and inside the tag body.
    static ref FRAGMENTED_TAG: Regex =
        Regex::new(r"(?s)\{(?:<[^>]+>|\s)*\{(.*?)\}(?:<[^>]+>|\s)*\}").unwrap();
    /// XML markup stripped from a reconstructed tag body.
    static ref XML_MARKUP: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    /// Variable names, with dotted segments for nested payload lookups.
    static ref TAG_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*)*$").unwrap();
    /// A clean, contiguous tag as it appears after normalization.
    pub(crate) static ref CONTIGUOUS_TAG: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").unwrap();
}

/// Reconstruct fragmented `{{tag}}` tokens within one XML part.
pub fn normalize_fragmented_tags(xml: &str) -> String {
    FRAGMENTED_TAG
        .replace_all(xml, |caps: &Captures| {
            let inner = &caps[1];
            let cleaned = XML_MARKUP.replace_all(inner, "");
            let cleaned = cleaned
                .replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&amp;", "&");
            let cleaned = WHITESPACE.replace_all(&cleaned, "");
            if TAG_NAME.is_match(&cleaned) {
                format!("{{{{{}}}}}", cleaned)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// List the tag names present in an XML part, unique, in document order.
///
/// Best-effort, used for request logging only.
pub fn detect_tags(xml: &str) -> Vec<String> {
    let mut found = Vec::new();
    for caps in CONTIGUOUS_TAG.captures_iter(xml) {
        let name = caps[1].to_string();
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}
