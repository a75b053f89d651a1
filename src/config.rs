//! Server configuration loaded from the environment.
//!
//! All settings are read once at startup (`.env` supported via dotenvy) and
//! shared read-only across workers afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Actix worker count.
    pub workers: usize,
    /// Root directory under which per-request workspaces are created.
    pub scratch_root: PathBuf,
    /// Upper bound on the uploaded template size, in bytes.
    pub max_template_bytes: usize,
    /// Hard timeout for one conversion call.
    pub conversion_timeout: Duration,
    /// Conversion engine binary (LibreOffice or compatible).
    pub converter_binary: String,
    /// Optional `host:port` of a long-lived engine listener. When set, the
    /// client polls this endpoint for readiness before converting.
    pub converter_endpoint: Option<String>,
    /// Readiness retry budget when an endpoint is configured.
    pub converter_ready_attempts: u32,
    /// Delay between readiness probes.
    pub converter_ready_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            workers: 4,
            scratch_root: env::temp_dir().join("docproc"),
            max_template_bytes: 20 * 1024 * 1024,
            conversion_timeout: Duration::from_secs(600),
            converter_binary: "libreoffice".to_string(),
            converter_endpoint: None,
            converter_ready_attempts: 15,
            converter_ready_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("PORT") {
            config.port = port.parse().context("PORT must be a valid port number")?;
        }
        if let Ok(workers) = env::var("WORKER_COUNT") {
            config.workers = workers
                .parse()
                .context("WORKER_COUNT must be a positive integer")?;
        }
        if let Ok(dir) = env::var("SCRATCH_DIR") {
            config.scratch_root = PathBuf::from(dir);
        }
        if let Ok(max) = env::var("MAX_TEMPLATE_BYTES") {
            config.max_template_bytes = max
                .parse()
                .context("MAX_TEMPLATE_BYTES must be an integer")?;
        }
        if let Ok(secs) = env::var("CONVERSION_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("CONVERSION_TIMEOUT_SECS must be an integer")?;
            config.conversion_timeout = Duration::from_secs(secs);
        }
        if let Ok(binary) = env::var("CONVERTER_BINARY") {
            config.converter_binary = binary;
        }
        if let Ok(endpoint) = env::var("CONVERTER_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.converter_endpoint = Some(endpoint);
            }
        }
        if let Ok(attempts) = env::var("CONVERTER_READY_ATTEMPTS") {
            config.converter_ready_attempts = attempts
                .parse()
                .context("CONVERTER_READY_ATTEMPTS must be an integer")?;
        }
        if let Ok(ms) = env::var("CONVERTER_READY_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .context("CONVERTER_READY_INTERVAL_MS must be an integer")?;
            config.converter_ready_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
