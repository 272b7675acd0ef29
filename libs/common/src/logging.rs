//! Console logging for drive services
//!
//! One registry, one console layer, one `EnvFilter`. `RUST_LOG` wins over
//! the configured level when it is set.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "\x1b[35m", // magenta
        Level::DEBUG => "\x1b[34m", // blue
        Level::INFO => "\x1b[32m",  // green
        Level::WARN => "\x1b[33m",  // yellow
        Level::ERROR => "\x1b[31m", // red
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809512Z [INFO] Opened /dev/ttyUSB0 @ 9600 8E1 slave=1`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            write!(
                writer,
                "{}{}\x1b[0m ",
                level_color(&level),
                format_level(&level)
            )?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset ("info", "debug", "info,vfd_modbus=debug")
    pub level: String,
    /// Emit ANSI colors on the level tag
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Pick the active filter string: `RUST_LOG` first, then the configured level
fn resolve_filter(configured: &str) -> String {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => env_str,
        _ => configured.to_string(),
    }
}

/// Initialize logging with the given configuration.
///
/// Returns `Ok(false)` when a global subscriber was already installed, in
/// which case nothing changes.
pub fn init_with_config(config: &LogConfig) -> Result<bool> {
    let filter_str = resolve_filter(&config.level);
    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| Error::Logging(format!("Invalid log filter '{}': {}", filter_str, e)))?;

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok();

    Ok(installed)
}

/// Initialize console logging at `level`
pub fn init_logging(level: &str, no_color: bool) -> Result<bool> {
    init_with_config(&LogConfig {
        level: level.to_string(),
        ansi: !no_color,
    })
}
