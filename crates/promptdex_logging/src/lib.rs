//! Shared logging setup for Promptdex binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "promptdex=info,promptdex_index=info";

/// Logging configuration shared by Promptdex binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Show the full filter on stderr instead of warnings only
    pub verbose: bool,
    /// Also append plain-text logs to this file
    pub log_file: Option<PathBuf>,
}

/// Initialize tracing with stderr output and an optional file writer.
///
/// `RUST_LOG` overrides the default filter for both outputs.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    let file_layer = match &config.log_file {
        Some(path) => {
            let writer = SharedFileWriter::open(path)
                .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[derive(Clone)]
struct SharedFileWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct SharedFileWriterGuard {
    inner: Arc<Mutex<File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedFileWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.flush()
    }
}
