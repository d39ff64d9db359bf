//! Structured logging for tangle
//!
//! Every log line carries structured fields so a render pass can be
//! followed from the output alone.
//!
//! # Log Format Conventions
//!
//! - `service`: The component logging ("block_cache", "artifact_store", ...)
//! - `operation`: What it was doing ("get", "put", "evaluate", "render")
//! - `status`: The result ("hit", "miss", "success", "exists", "error")
//! - `key`: Cache or artifact key (hex-encoded)
//! - `position`: 0-based block index in the document
//! - `size_bytes`: Size in bytes
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! let key = "9f86d081884c7d65";
//! info!(
//!     service = "block_cache",
//!     operation = "get",
//!     status = "hit",
//!     position = 0,
//!     key = %key,
//!     "Pulled block from cache"
//! );
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Env var selecting the log format
pub const LOG_FORMAT_ENV: &str = "TANGLE_LOG_FORMAT";

/// Formatter that prints "(tangle)" next to the level instead of the module path
struct TangleFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for TangleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{}{:5}(tangle)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(tangle): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, human-readable
    Pretty,
    /// Same layout without colors
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse a format name; anything unrecognized yields `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Read `TANGLE_LOG_FORMAT`, defaulting to compact under CI and pretty otherwise
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|name| Self::parse(&name))
            .unwrap_or_else(|| {
                if std::env::var("CI").is_ok() {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            })
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Log level filter (e.g., "debug", "tangle=trace")
/// - `TANGLE_LOG_FORMAT`: "pretty", "compact" or "json"
/// - `CI`: If set, defaults to compact format
///
/// Logs always go to stderr so rendered output on stdout stays clean.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match LogFormat::from_env() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(TangleFormatter { with_ansi: true })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(TangleFormatter { with_ansi: false })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(false)
                        .with_writer(io::stderr)
                        .json(),
                )
                .init();
        }
    }
}

/// Service names for consistent logging
pub mod services {
    pub const PIPELINE: &str = "pipeline";
    pub const BLOCK_CACHE: &str = "block_cache";
    pub const ARTIFACT_STORE: &str = "artifact_store";
    pub const WATCH: &str = "watch";
}

/// Operation names for consistent logging
pub mod operations {
    pub const GET: &str = "get";
    pub const PUT: &str = "put";
    pub const EVALUATE: &str = "evaluate";
    pub const RENDER: &str = "render";
}

/// Status values for consistent logging
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const HIT: &str = "hit";
    pub const MISS: &str = "miss";
    pub const EXISTS: &str = "exists";
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" Compact "), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("PRETTY"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
