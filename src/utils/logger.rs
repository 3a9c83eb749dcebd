use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Output encoding for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than "json" is text
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub tee: bool,
    pub timestamp: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
            format: LogFormat::Text,
            file: None,
            tee: false,
            timestamp: true,
        }
    }
}

/// Map a level name to a filter. Unknown names mean info.
pub fn parse_level(value: &str) -> LevelFilter {
    match value.to_ascii_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Map a --verbose count to a filter
pub fn verbosity_level(count: u8) -> Option<LevelFilter> {
    match count {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logging system.
///
/// Logs never go to stdout: that stream belongs to the container and to
/// dry-run output.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::new(format!(
        "{},cderun={}",
        settings.level.min(LevelFilter::WARN),
        settings.level
    ));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {:?}", path.display()))?;
            layers.push(layer(settings, Mutex::new(file)));
            if settings.tee {
                layers.push(layer(settings, std::io::stderr));
            }
        }
        None => layers.push(layer(settings, std::io::stderr)),
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .context("failed to initialize logger")?;

    Ok(())
}

fn layer<W>(settings: &LogSettings, writer: W) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match (settings.format, settings.timestamp) {
        (LogFormat::Json, true) => base.json().boxed(),
        (LogFormat::Json, false) => base.json().without_time().boxed(),
        (LogFormat::Text, true) => base.compact().boxed(),
        (LogFormat::Text, false) => base.compact().without_time().boxed(),
    }
}
