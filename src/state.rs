//! Shared application state.
//!
//! Read-only after startup; the only cross-request synchronisation lives
//! inside the converter (engine invocation gate).

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::convert::{Converter, LibreOfficeConverter};
use crate::pipeline::RenderPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<RenderPipeline>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let converter: Arc<dyn Converter> = Arc::new(LibreOfficeConverter::from_config(&config));
        Self::with_converter(config, converter)
    }

    /// Build state with an explicit converter. Tests use this to substitute
    /// a mock engine.
    pub fn with_converter(config: ServerConfig, converter: Arc<dyn Converter>) -> Self {
        let pipeline = Arc::new(RenderPipeline::new(&config, converter));
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }
}
