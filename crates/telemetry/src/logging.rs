use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    /// Single-line text
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`; unknown values fall back to pretty.
    pub fn from_env() -> Self {
        Self::parse(&env::var("LOG_FORMAT").unwrap_or_default())
    }

    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Configuration for structured logging
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Binary or component name, e.g. "plate-service"
    pub service_name: String,
    pub service_version: String,
    /// Enable span events (new/close)
    pub enable_span_events: bool,
    /// Also write JSON lines to a daily-rolling file under `log_dir`
    pub log_to_file: bool,
    pub log_dir: Option<String>,
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            format: LogFormat::from_env(),
            service_name: service_name.into(),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            enable_span_events: env_flag("LOG_SPAN_EVENTS"),
            log_to_file: env_flag("LOG_TO_FILE"),
            log_dir: env::var("LOG_DIR").ok(),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.enable_span_events = enable;
        self
    }

    pub fn with_file_logging(mut self, log_dir: impl Into<String>) -> Self {
        self.log_to_file = true;
        self.log_dir = Some(log_dir.into());
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn file_name(&self) -> String {
        format!("{}.log", self.service_name)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false)
}

fn quiet(filter: EnvFilter, directive: &str) -> EnvFilter {
    match directive.parse::<Directive>() {
        Ok(d) => filter.add_directive(d),
        Err(_) => filter,
    }
}

fn build_filter() -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = quiet(filter, "ort=warn");
    quiet(filter, "tokio=warn")
}

/// Installs the global subscriber.
///
/// When file logging is enabled the returned guard flushes the background
/// writer on drop and must be held for the lifetime of the process. Calling
/// this twice is harmless; the second install is ignored.
pub fn init_structured_logging(config: LogConfig) -> Option<WorkerGuard> {
    let registry = tracing_subscriber::registry().with(build_filter());
    let span_events = config.span_events();
    let mut guard = None;

    let installed = match config.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(span_events.clone())
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_writer(io::stdout);

            match (config.log_to_file, config.log_dir.as_deref()) {
                (true, Some(log_dir)) => {
                    let file_appender =
                        tracing_appender::rolling::daily(log_dir, config.file_name());
                    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
                    guard = Some(file_guard);
                    let file_layer = fmt::layer()
                        .json()
                        .with_span_events(span_events)
                        .with_writer(non_blocking);
                    registry.with(json_layer).with(file_layer).try_init()
                }
                _ => registry.with(json_layer).try_init(),
            }
        }
        LogFormat::Compact => {
            let compact_layer = fmt::layer()
                .compact()
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(false);
            registry.with(compact_layer).try_init()
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true);
            registry.with(pretty_layer).try_init()
        }
    };

    if installed.is_ok() {
        tracing::info!(
            service.name = %config.service_name,
            service.version = %config.service_version,
            format = ?config.format,
            file_logging = guard.is_some(),
            "structured logging initialized"
        );
    }

    guard
}

pub fn init_with_service(service_name: impl Into<String>) -> Option<WorkerGuard> {
    init_structured_logging(LogConfig::new(service_name))
}
