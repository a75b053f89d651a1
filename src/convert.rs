//! Conversion engine client.
//!
//! Drives an external LibreOffice-compatible engine to turn a rendered docx
//! into a PDF. The engine may run as a long-lived listener (endpoint
//! configured, readiness polled over TCP) or be spawned per call. Behind the
//! [`Converter`] trait so the pipeline, and tests, stay agnostic to the
//! actual engine.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

use crate::config::ServerConfig;

/// Errors raised by one conversion attempt.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("conversion engine never became ready after {attempts} attempts")]
    EngineUnavailable { attempts: u32 },
    #[error("failed to launch conversion engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("conversion timed out after {limit_secs}s")]
    Timeout { limit_secs: u64 },
    #[error("conversion engine exited with status {0}")]
    EngineExit(i32),
    #[error("conversion reported success but produced no usable output")]
    MissingOutput,
    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability to convert a document file to PDF.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` to a PDF inside `output_dir` and return the PDF path.
    async fn convert_to_pdf(&self, input: &Path, output_dir: &Path)
        -> Result<PathBuf, ConvertError>;
}

/// Client for a headless LibreOffice engine.
pub struct LibreOfficeConverter {
    binary: String,
    endpoint: Option<String>,
    conversion_timeout: Duration,
    ready_attempts: u32,
    ready_interval: Duration,
    /// A single LibreOffice profile cannot run concurrent conversions, so
    /// invocations are serialised here.
    invocation_gate: Mutex<()>,
}

impl LibreOfficeConverter {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            binary: config.converter_binary.clone(),
            endpoint: config.converter_endpoint.clone(),
            conversion_timeout: config.conversion_timeout,
            ready_attempts: config.converter_ready_attempts,
            ready_interval: config.converter_ready_interval,
            invocation_gate: Mutex::new(()),
        }
    }

    /// Poll the engine listener until it accepts a connection.
    ///
    /// No-op when no endpoint is configured (per-call spawn mode). The total
    /// wait is bounded by `attempts x (probe timeout + interval)`.
    async fn wait_for_engine(&self) -> Result<(), ConvertError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };

        for attempt in 1..=self.ready_attempts {
            match timeout(self.ready_interval, TcpStream::connect(endpoint.as_str())).await {
                Ok(Ok(_)) => {
                    debug!("conversion engine ready at {} (attempt {})", endpoint, attempt);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(
                        "conversion engine not ready at {} (attempt {}/{}): {}",
                        endpoint, attempt, self.ready_attempts, e
                    );
                }
                Err(_) => {
                    debug!(
                        "conversion engine probe timed out at {} (attempt {}/{})",
                        endpoint, attempt, self.ready_attempts
                    );
                }
            }
            // Sleep only between attempts, not after the last one.
            if attempt < self.ready_attempts {
                sleep(self.ready_interval).await;
            }
        }

        Err(ConvertError::EngineUnavailable {
            attempts: self.ready_attempts,
        })
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    async fn convert_to_pdf(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        self.wait_for_engine().await?;

        let _guard = self.invocation_gate.lock().await;

        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--nologo")
            .arg("--nolockcheck")
            .arg("--nodefault")
            .arg("--invisible")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(output_dir)
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(ConvertError::Spawn)?;

        // Dropping the wait future on timeout kills the child via
        // kill_on_drop, so no conversion process outlives its request.
        let output = match timeout(self.conversion_timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    "conversion of {} timed out after {:?}",
                    input.display(),
                    self.conversion_timeout
                );
                return Err(ConvertError::Timeout {
                    limit_secs: self.conversion_timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            error!(
                "conversion engine exited with status {}: {}",
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ConvertError::EngineExit(code));
        }

        // Engine exit codes are not reliable; trust only the artifact.
        let stem = input
            .file_stem()
            .ok_or(ConvertError::MissingOutput)?
            .to_string_lossy();
        let pdf_path = output_dir.join(format!("{}.pdf", stem));
        match tokio::fs::metadata(&pdf_path).await {
            Ok(meta) if meta.len() > 0 => {
                info!(
                    "converted {} -> {} ({} bytes)",
                    input.display(),
                    pdf_path.display(),
                    meta.len()
                );
                Ok(pdf_path)
            }
            _ => Err(ConvertError::MissingOutput),
        }
    }
}
