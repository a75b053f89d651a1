//! HTTP-facing document processing module.

pub mod handlers;
pub mod models;
pub mod multipart;
