//! # Logging
//!
//! `tracing` subscriber setup for the player core, plus the helpers every
//! crate uses to keep stream credentials and local paths out of log output.
//!
//! ## Overview
//!
//! [`init_logging`] installs one global subscriber made of:
//! - an [`EnvFilter`] that keeps workspace crates at the requested level and
//!   quiets the HTTP and SQLite stacks to `warn`
//! - a formatting layer writing to stdout (pretty, compact or JSON)
//! - an optional forwarding layer that mirrors each surviving event to the
//!   host's [`LoggerSink`]
//!
//! Events forwarded to the host have their fields redacted with
//! [`redact_if_sensitive`]: credential fields are masked and URL fields lose
//! their query string (Subsonic-style servers put `u`, `t` and `s` there).
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::logging::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(host_sink),
//! )?;
//!
//! tracing::info!(song_id = "s1", url = %stream_url, "Stream resolved");
//! ```

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Crates that log at the configured level when no explicit filter is set.
const WORKSPACE_TARGETS: &[&str] = &[
    "player_workspace",
    "core_runtime",
    "core_library",
    "core_playback",
    "core_download",
    "core_service",
    "bridge_desktop",
];

/// Dependencies held at `warn` in the default filter.
const NOISY_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx"];

const MASK: &str = "[REDACTED]";

/// How events are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured. Debug builds default to this.
    Pretty,
    /// One line per event.
    Compact,
    /// Flattened JSON objects. Release builds default to this.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Mask credentials in fields forwarded to the sink.
    pub redact: bool,
    /// Log span enter/exit (pretty) or attach span context (JSON).
    pub spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            redact: true,
            spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] when the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = config
        .logger_sink
        .clone()
        .map(|sink| HostForwardLayer::new(sink, config.redact));

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(&config))
        .with(forward)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = level_directive(config.level);
            WORKSPACE_TARGETS
                .iter()
                .map(|target| format!("{target}={level}"))
                .chain(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")))
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn format_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    match config.format {
        LogFormat::Pretty => {
            let spans = if config.spans {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            };
            base.pretty().with_span_events(spans).boxed()
        }
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.spans)
            .with_span_list(config.spans)
            .boxed(),
    }
}

// ============================================================================
// Host forwarding
// ============================================================================

/// Mirrors events into a [`LoggerSink`].
struct HostForwardLayer {
    sink: Arc<dyn LoggerSink>,
    redact: bool,
}

impl HostForwardLayer {
    fn new(sink: Arc<dyn LoggerSink>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn entry_for(&self, event: &Event<'_>, level: LogLevel) -> LogEntry {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());

        fields
            .values
            .into_iter()
            .fold(LogEntry::new(level, metadata.target(), message), |entry, (key, value)| {
                let value = if self.redact {
                    redact_if_sensitive(&key, &value)
                } else {
                    value
                };
                entry.with_field(key, value)
            })
    }
}

impl<S> Layer<S> for HostForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = to_log_level(*event.metadata().level());
        if level < self.sink.min_level() {
            return;
        }

        let entry = self.entry_for(event, level);
        let sink = Arc::clone(&self.sink);
        let deliver = async move {
            if let Err(e) = sink.log(entry).await {
                eprintln!("logger sink rejected entry: {}", e);
            }
        };

        // Outside a runtime the sink is driven inline
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(deliver);
            }
            Err(_) => futures::executor::block_on(deliver),
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn to_log_level(level: Level) -> LogLevel {
    if level == Level::ERROR {
        LogLevel::Error
    } else if level == Level::WARN {
        LogLevel::Warn
    } else if level == Level::INFO {
        LogLevel::Info
    } else if level == Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

// ============================================================================
// Redaction helpers
// ============================================================================

/// Mask a field value whose name suggests a credential.
///
/// - names containing `token`, `password`, `secret`, `salt`, `api_key` or
///   `auth` are replaced with `[REDACTED]`
/// - names containing `url` or `uri` keep everything before the `?`
/// - values that look like an email keep only their first character
///
/// ```ignore
/// use core_runtime::logging::redact_if_sensitive;
///
/// info!(url = %redact_if_sensitive("url", &stream_url), "Buffering");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const SECRETS: &[&str] = &["token", "password", "secret", "salt", "api_key", "auth", "bearer"];

    let name = field_name.to_ascii_lowercase();
    if SECRETS.iter().any(|secret| name.contains(secret)) {
        return MASK.to_string();
    }
    if name.contains("url") || name.contains("uri") {
        return strip_query(value).to_string();
    }
    match value.split_once('@') {
        Some((user, domain)) if domain.contains('.') => {
            let first = user.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{MASK}")
        }
        _ => value.to_string(),
    }
}

/// Everything before the query string of a URL.
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// File name of a local path, for logging downloaded files without the
/// user's directory layout.
pub fn strip_path(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or(path, |at| &path[at + 1..])
}
