//! Centralized logging for Veneer applications
//!
//! Provides a custom formatter for tracing that:
//! - Formats thread IDs as #N instead of ThreadId(N)
//! - Extracts the `family` and `handle` fields of object model events and
//!   displays them as `door::#12v1: message`
//! - Strips the application prefix from targets for cleaner output
//! - Filters external dependency logs based on the `VENEER_LOGDEPS` environment variable
//!
//! # Environment Variables
//!
//! - `VENEER_LOGDEPS`: Set to `1` to enable logging from external dependencies.
//!   Default is `0` which only shows logs from Veneer crates.
//! - `RUST_LOG`: Overrides the default filter directives.
//!
//! # Usage
//!
//! ```rust,ignore
//! use veneer_log::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! let file = std::fs::File::create("host.log")?;
//! let config = LogConfig::new("veneer_host::")
//!     .with_log_file(file)
//!     .with_level(Level::DEBUG);
//! init_logging(config)?;
//! ```

use std::fmt as std_fmt;
use std::io::Write;

use tracing::Level;
use tracing::field::Field;
use tracing_subscriber::field::Visit;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose logs are shown when dependency logging is off
const VENEER_CRATES: [&str; 3] = ["veneer_host", "veneer_model", "veneer_log"];

/// Field extractor for the object model's structured fields
///
/// Events carrying both `family` and `handle` are printed as
/// `family::handle: message` instead of the usual target prefix.
#[derive(Default)]
pub struct FieldExtractor {
    pub family: Option<String>,
    pub handle: Option<String>,
    pub message: Option<String>,
    /// Remaining fields, already rendered as `name=value`
    pub extra: Vec<String>,
}

impl FieldExtractor {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "family" => self.family = Some(value),
            "handle" => self.handle = Some(value),
            "message" => self.message = Some(value),
            name => self.extra.push(format!("{}={}", name, value)),
        }
    }
}

impl Visit for FieldExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std_fmt::Debug) {
        self.store(field, format!("{:?}", value).trim_matches('"').to_string());
    }
}

/// Custom event formatter for Veneer applications
///
/// Features:
/// - Thread IDs displayed as #N instead of ThreadId(N)
/// - Object model logs formatted as `door::#12v1: message`
/// - Configurable ANSI color support
/// - Configurable target prefix stripping
pub struct CustomFormatter<T> {
    timer: T,
    ansi: bool,
    /// Prefix to strip from log targets (e.g., "veneer_host::")
    strip_prefix: Option<String>,
}

impl<T> CustomFormatter<T> {
    pub fn new(timer: T, ansi: bool) -> Self {
        Self {
            timer,
            ansi,
            strip_prefix: None,
        }
    }

    /// Set the prefix to strip from log targets
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Target as displayed: our own prefix stripped, the bare app name hidden
    fn display_target<'t>(&self, target: &'t str) -> Option<&'t str> {
        let Some(prefix) = &self.strip_prefix else {
            return Some(target).filter(|t| !t.is_empty());
        };
        let app_name = prefix.trim_end_matches("::");
        if target == app_name || target.is_empty() {
            return None;
        }
        Some(target.strip_prefix(prefix.as_str()).unwrap_or(target))
    }
}

impl<T: Clone> Clone for CustomFormatter<T> {
    fn clone(&self) -> Self {
        Self {
            timer: self.timer.clone(),
            ansi: self.ansi,
            strip_prefix: self.strip_prefix.clone(),
        }
    }
}

fn level_label(level: Level, ansi: bool) -> (&'static str, &'static str) {
    let (color, label) = match level {
        Level::ERROR => ("\x1b[31m", "ERROR"),
        Level::WARN => ("\x1b[33m", " WARN"),
        Level::INFO => ("\x1b[32m", " INFO"),
        Level::DEBUG => ("\x1b[34m", "DEBUG"),
        Level::TRACE => ("\x1b[35m", "TRACE"),
    };
    (if ansi { color } else { "" }, label)
}

/// Current thread as `#NNN`, if the id has the usual debug shape
fn thread_tag() -> Option<String> {
    let thread_id = format!("{:?}", std::thread::current().id());
    thread_id
        .strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(")"))
        .and_then(|n| n.parse::<u64>().ok())
        .map(|n| format!("#{:03}", n))
}

impl<S, N, T> FormatEvent<S, N> for CustomFormatter<T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: fmt::time::FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();

        let (dim_start, dim_end) = if self.ansi { ("\x1b[2m", "\x1b[0m") } else { ("", "") };
        let (level_color, level_str) = level_label(*metadata.level(), self.ansi);
        let color_end = if self.ansi { "\x1b[0m" } else { "" };

        write!(writer, "{}", dim_start)?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "{} ", dim_end)?;
        write!(writer, "{}{}{} ", level_color, level_str, color_end)?;

        if let Some(tag) = thread_tag() {
            write!(writer, "{} ", tag)?;
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        if let (Some(family), Some(handle)) = (&extractor.family, &extractor.handle) {
            write!(writer, "{}{}::{}{}: ", dim_start, family, handle, dim_end)?;
            if let Some(message) = &extractor.message {
                write!(writer, "{}", message)?;
            }
            for field in &extractor.extra {
                write!(writer, " {}{}{}", dim_start, field, dim_end)?;
            }
        } else {
            if let Some(target) = self.display_target(metadata.target()) {
                write!(writer, "{}{}{}: ", dim_start, target, dim_end)?;
            }
            ctx.field_format().format_fields(writer.by_ref(), event)?;
        }

        writeln!(writer)
    }
}

/// Timer using the local UTC offset, `[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]`
///
/// Falls back to UTC if the local offset cannot be determined.
pub fn create_custom_timer() -> OffsetTime<&'static [time::format_description::BorrowedFormatItem<'static>]> {
    use time::macros::format_description;

    let format = format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]");
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, format)
}

/// Check if dependency logging is enabled via the VENEER_LOGDEPS environment variable
pub fn is_dependency_logging_enabled() -> bool {
    std::env::var("VENEER_LOGDEPS").map(|v| v == "1").unwrap_or(false)
}

/// Build the filter directive for the given level
///
/// Without dependency logging, everything outside the Veneer crates is off.
pub fn build_filter_directives(level: Level, log_deps: bool) -> String {
    let level_str = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };

    if log_deps {
        return level_str.to_string();
    }

    let mut directives = String::from("off");
    for krate in VENEER_CRATES {
        directives.push_str(&format!(",{}={}", krate, level_str));
    }
    directives
}

/// Detect if ANSI colors should be used based on environment
///
/// Disables ANSI colors if:
/// - stdout is not a TTY (piped/redirected)
/// - NO_COLOR env var is set (https://no-color.org/)
/// - TERM=dumb
pub fn should_use_ansi() -> bool {
    atty::is(atty::Stream::Stdout)
        && std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Logging configuration
pub struct LogConfig<W: Write + Send + 'static = std::fs::File> {
    /// Prefix to strip from log targets (e.g., "veneer_host::")
    pub strip_prefix: String,
    /// Whether to use ANSI color codes (auto-detected if None)
    pub use_ansi: Option<bool>,
    pub level: Level,
    /// Optional file receiving a copy of every log line, without colors
    pub log_file: Option<W>,
}

impl<W: Write + Send + 'static> LogConfig<W> {
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            use_ansi: None,
            level: Level::INFO,
            log_file: None,
        }
    }

    pub fn with_ansi(mut self, use_ansi: bool) -> Self {
        self.use_ansi = Some(use_ansi);
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_file(mut self, file: W) -> Self {
        self.log_file = Some(file);
        self
    }
}

/// Initialize the global subscriber with the given configuration
pub fn init_logging<W: Write + Send + 'static>(config: LogConfig<W>) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let timer = create_custom_timer();
    let use_ansi = config.use_ansi.unwrap_or_else(should_use_ansi);
    let filter_directives = build_filter_directives(config.level, is_dependency_logging_enabled());

    // RUST_LOG wins over our defaults
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_directives));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(CustomFormatter::new(timer.clone(), use_ansi).with_strip_prefix(&config.strip_prefix))
        .with_ansi(use_ansi)
        .with_writer(std::io::stdout);

    let file_layer = config.log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(CustomFormatter::new(timer, false).with_strip_prefix(&config.strip_prefix))
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::fmt::time::FormatTime;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[derive(Clone)]
    struct NoTime;

    impl FormatTime for NoTime {
        fn format_time(&self, w: &mut Writer<'_>) -> std_fmt::Result {
            write!(w, "T")
        }
    }

    fn render(prefix: &str, emit: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let layer = tracing_subscriber::fmt::layer()
            .event_format(CustomFormatter::new(NoTime, false).with_strip_prefix(prefix))
            .with_ansi(false)
            .with_writer(buffer.clone());
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), emit);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_family_and_handle_prefix() {
        let output = render("veneer_log::", || {
            tracing::warn!(family = %"door", handle = %"#12v1", "No constructor registered");
        });
        assert!(output.contains(" WARN "), "{output}");
        assert!(output.contains("door::#12v1: No constructor registered"), "{output}");
    }

    #[test]
    fn test_target_prefix_stripped() {
        let output = render("veneer_log::", || {
            tracing::info!(target: "veneer_log::scenario", "tick done");
            tracing::info!(target: "veneer_log", "bare");
        });
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].contains("scenario: tick done"), "{output}");
        assert!(!lines[1].contains("veneer_log:"), "{output}");
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(build_filter_directives(Level::DEBUG, true), "debug");
        let directives = build_filter_directives(Level::WARN, false);
        assert!(directives.starts_with("off,"));
        assert!(directives.contains("veneer_model=warn"));
        assert!(directives.contains("veneer_host=warn"));
    }
}
