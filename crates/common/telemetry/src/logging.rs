// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    env,
    io::IsTerminal,
    sync::{Arc, Mutex, Once},
    time::Duration,
};

use bon::Builder;
use logroll_common_filelog::{
    FileLogConfig, FileLogLayer, JsonFormatter, LogQueueProcessor, Result as FileLogResult,
};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{Subscriber, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// # Errors
/// Returns an error if deserialization fails.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Global handle for reloading the level filter at runtime.
///
/// Only available after [`init_global_logging`] has been called.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// The processor behind the global file layer, if file logging is enabled.
pub static FILE_LOG_PROCESSOR: OnceCell<Arc<LogQueueProcessor>> = OnceCell::new();

/// Default log level filter when neither `level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Log level filter string, e.g. `"info"` or `"info,my_crate::db=debug"`.
    /// Falls back to `RUST_LOG`, then to `"info"`.
    pub level: Option<String>,

    /// Output format for both stdout and file lines.
    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Whether to also write logs to stdout.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,

    /// Asynchronous file logging; disabled when `None`.
    pub file: Option<FileLogConfig>,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line.
    Json,

    /// Human-readable text.
    #[default]
    Text,
}

/// Keeps logging alive. Dropping it stops the stdout worker and disposes the
/// file log processor, writing every pending line.
#[must_use]
#[derive(Default)]
pub struct LoggingGuard {
    workers:   Vec<WorkerGuard>,
    processor: Option<Arc<LogQueueProcessor>>,
}

impl LoggingGuard {
    pub fn processor(&self) -> Option<&Arc<LogQueueProcessor>> { self.processor.as_ref() }
}

impl Drop for LoggingGuard {
    #[allow(clippy::print_stderr)]
    fn drop(&mut self) {
        if let Some(processor) = self.processor.take()
            && let Err(e) = processor.dispose()
        {
            eprintln!("failed to dispose file logging: {e}");
        }
        self.workers.clear();
    }
}

/// Initialize stdout-only logging with default options.
pub fn init_tracing_subscriber(app_name: &str) -> LoggingGuard {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for unit tests.
///
/// # Environment Variables
///
/// * `UNITTEST_LOG_DIR` - Directory for test logs (default:
///   "/tmp/__unittest_logs")
/// * `UNITTEST_LOG_LEVEL` - Log level filter (default: "debug")
///
/// Safe to call from many tests; only the first call initializes.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let opts = LoggingOptions {
            level: Some(level),
            file: Some(FileLogConfig {
                directory: dir.clone().into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        info!("logs dir = {}", dir);
    });
}

static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<LoggingGuard>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Builds the file layer for `config` in the requested format.
///
/// Returns the boxed layer together with its processor so the caller can
/// dispose or reconfigure it.
pub fn file_logging_layer<S>(
    config: &FileLogConfig,
    format: LogFormat,
) -> FileLogResult<(Box<dyn Layer<S> + Send + Sync>, Arc<LogQueueProcessor>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let processor = Arc::new(LogQueueProcessor::from_config(config)?);
    let layer = match format {
        LogFormat::Text => FileLogLayer::new(Arc::clone(&processor)).boxed(),
        LogFormat::Json => {
            FileLogLayer::with_formatter(Arc::clone(&processor), JsonFormatter).boxed()
        }
    };
    Ok((layer, processor))
}

/// Initialize the global subscriber.
///
/// Layers:
///
/// - **Level filter**: reloadable through [`reload_level`]
/// - **Stdout Layer**: non-blocking stdout (if `append_stdout` is true)
/// - **File Layer**: [`LogQueueProcessor`]-backed rolling files (if `file`
///   is set)
///
/// Only the first call does anything; later calls return an empty guard.
///
/// # Panics
///
/// Panics on critical initialization failures so that observability problems
/// surface at startup: the log directory cannot be created, the file
/// configuration is invalid, or the level string does not parse.
#[allow(clippy::print_stdout)]
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> LoggingGuard {
    static START: Once = Once::new();
    let mut guard = LoggingGuard::default();

    START.call_once(|| {
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = if opts.append_stdout {
            let (writer, worker) = tracing_appender::non_blocking(std::io::stdout());
            guard.workers.push(worker);

            if opts.log_format == LogFormat::Json {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(std::io::stdout().is_terminal())
                        .with_current_span(true)
                        .with_span_list(true)
                        .boxed(),
                )
            } else {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(writer)
                        .with_ansi(std::io::stdout().is_terminal())
                        .boxed(),
                )
            }
        } else {
            None
        };

        let file_layer = opts.file.as_ref().map(|config| {
            let (layer, processor) =
                file_logging_layer(config, opts.log_format).unwrap_or_else(|e| {
                    panic!(
                        "initializing file logging at {} failed: {e}",
                        config.directory.display()
                    )
                });
            let _ = FILE_LOG_PROCESSOR.set(Arc::clone(&processor));
            guard.processor = Some(processor);
            layer
        });

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

        RELOAD_HANDLE
            .set(reload_handle)
            .expect("reload handle already set, maybe init_global_logging get called twice?");

        let subscriber = Registry::default()
            .with(dyn_filter)
            .with(stdout_logging_layer)
            .with(file_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");

        info!(app = app_name, format = %opts.log_format, "Logging initialized");
    });

    guard
}

/// Errors raised while reloading logging settings.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReloadError {
    #[snafu(display("Logging has not been initialized"))]
    NotInitialized,

    #[snafu(display("Invalid log level {level}"))]
    ParseLevel {
        level:  String,
        source: filter::ParseError,
    },

    #[snafu(display("Failed to swap level filter"))]
    SwapFilter {
        source: tracing_subscriber::reload::Error,
    },

    #[snafu(transparent)]
    FileLog {
        source: logroll_common_filelog::FileLogError,
    },
}

/// Replaces the global level filter.
pub fn reload_level(level: &str) -> Result<(), ReloadError> {
    let targets = level
        .parse::<filter::Targets>()
        .context(ParseLevelSnafu { level })?;
    RELOAD_HANDLE
        .get()
        .context(NotInitializedSnafu)?
        .reload(targets)
        .context(SwapFilterSnafu)?;
    info!(level, "Log level reloaded");
    Ok(())
}

/// Applies a new [`FileLogConfig`] to the global file log processor.
pub fn reload_file_logging(config: &FileLogConfig) -> Result<(), ReloadError> {
    let processor = FILE_LOG_PROCESSOR.get().context(NotInitializedSnafu)?;
    apply_file_config(processor, config)?;
    Ok(())
}

/// Pushes the parts of `config` that differ from the processor's current
/// settings. Returns `true` if anything changed.
///
/// File settings go first: if the new directory cannot be opened the queue
/// settings are left as they were.
pub fn apply_file_config(processor: &LogQueueProcessor, config: &FileLogConfig) -> FileLogResult<bool> {
    config.validate()?;
    let mut changed = false;

    let wanted = (config.directory.clone(), config.rolling_interval);
    if processor.file_settings().as_ref() != Some(&wanted) {
        processor.update_file_writer_settings(wanted.0, wanted.1)?;
        changed = true;
    }

    if processor.queue_settings() != (config.queue_full_policy, config.max_queue_length) {
        processor.update_queue_settings(config.queue_full_policy, config.max_queue_length)?;
        changed = true;
    }

    Ok(changed)
}

/// Waits up to `timeout` for the global file log processor to write out its
/// queue. Returns `true` when nothing is left pending, including when file
/// logging is not enabled.
pub fn flush_file_logging(timeout: Duration) -> bool {
    FILE_LOG_PROCESSOR
        .get()
        .is_none_or(|processor| processor.flush(timeout))
}
