//! Logging handle: level, sink, and the fixed line format.
//!
//! Every line looks like `timestamp - LEVEL - file.rs:function - message`.
//! `function` is the innermost active span (functions are instrumented with
//! `#[tracing::instrument]`), falling back to the last module path segment.

use crate::config::LoggingConfig;
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Errors that can occur while setting up logging.
#[derive(Debug)]
pub enum LoggingError {
    /// The log file could not be opened for appending.
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::OpenFile { path, source } => {
                write!(f, "failed to open log file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::OpenFile { source, .. } => Some(source),
        }
    }
}

/// Where formatted lines are written.
#[derive(Clone)]
enum LogSink {
    Stdout,
    File {
        path: PathBuf,
        file: Arc<Mutex<File>>,
    },
}

/// Writer handed out per event. Holds the sink lock for one formatted line.
enum SinkWriter<'a> {
    Stdout(io::StdoutLock<'static>),
    File(MutexGuard<'a, File>),
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Stdout(out) => out.write(buf),
            SinkWriter::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Stdout(out) => out.flush(),
            SinkWriter::File(file) => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            LogSink::Stdout => SinkWriter::Stdout(io::stdout().lock()),
            LogSink::File { file, .. } => {
                SinkWriter::File(file.lock().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}

/// Explicitly constructed logging handle for the service.
///
/// Created once at startup, installed as the default dispatcher, and flushed
/// on the way out.
pub struct LogHandle {
    level: Level,
    sink: LogSink,
}

impl LogHandle {
    /// Open the sink described by `config`.
    ///
    /// With a log directory the file `<dir>/pylftp.log` is opened in append
    /// mode (created if missing). The directory itself must already exist.
    pub fn open(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let sink = match config.log_file() {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| LoggingError::OpenFile {
                        path: path.clone(),
                        source: e,
                    })?;
                LogSink::File {
                    path,
                    file: Arc::new(Mutex::new(file)),
                }
            }
            None => LogSink::Stdout,
        };
        Ok(Self {
            level: config.level(),
            sink,
        })
    }

    /// Effective log level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Path of the log file, or `None` when logging to stdout.
    pub fn log_file(&self) -> Option<&Path> {
        match &self.sink {
            LogSink::Stdout => None,
            LogSink::File { path, .. } => Some(path),
        }
    }

    /// Build a dispatcher that writes this crate's events to the sink.
    ///
    /// Events from other crates are filtered out, so the handle behaves like a
    /// logger named after the service.
    pub fn dispatch(&self) -> Dispatch {
        let directive = format!(
            "{}={}",
            env!("CARGO_CRATE_NAME"),
            self.level.as_str().to_ascii_lowercase()
        );
        let subscriber = tracing_subscriber::fmt()
            .event_format(LineFormat)
            .with_writer(self.sink.clone())
            .with_env_filter(EnvFilter::new(directive))
            .finish();
        Dispatch::new(subscriber)
    }

    /// Flush buffered output to the sink.
    pub fn flush(&self) -> io::Result<()> {
        match &self.sink {
            LogSink::Stdout => io::stdout().flush(),
            LogSink::File { file, .. } => file
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush(),
        }
    }
}

/// `timestamp - LEVEL - file:function - message`
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let file = meta.file().map(file_name).unwrap_or("?");
        let function = ctx
            .lookup_current()
            .map(|span| span.name())
            .or_else(|| meta.module_path().map(last_segment))
            .unwrap_or("?");

        write!(
            writer,
            "{} - {} - {}:{} - ",
            Local::now().format(TIMESTAMP_FORMAT),
            level_name(meta.level()),
            file,
            function
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: &Level) -> &'static str {
    if *level == Level::WARN {
        "WARNING"
    } else {
        level.as_str()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn last_segment(module_path: &str) -> &str {
    module_path.rsplit("::").next().unwrap_or(module_path)
}
