//! Structured logging for tillkeep.
//!
//! Every crate in the workspace logs through the macros exported here so that
//! gateway decisions, rejected webhook signatures and reconciliation outcomes
//! end up in one consistent stream on stderr.
//!
//! # Usage
//!
//! ```rust
//! use tillkeep_log::{debug, info, warn};
//!
//! info!("Reconciliation pass started");
//! debug!(target: "tillkeep::gateway", "Replaying stored result for key {}", "abc");
//!
//! // Key-value fields are carried as structured data in JSON output
//! let shipment = "SHP-1";
//! warn!(fields: { "shipment_id" => shipment, "attempt" => 3 }, "Provider query failed");
//! ```
//!
//! # Environment Variables
//!
//! - `TILLKEEP_DEBUG=1` - Enable debug logging
//! - `TILLKEEP_LOG_LEVEL=trace|debug|info|warn|error|off` - Minimum level
//! - `TILLKEEP_LOG_FORMAT=pretty|compact|json` - Output format (default `json`)
//! - `TILLKEEP_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `TILLKEEP_LOG_MODULE=1|0` - Include the module path / target

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Levels
// ============================================================================

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Nothing is emitted
    Off = 5,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Format
// ============================================================================

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable, one record per line with aligned level
    Pretty,
    /// Terse single-letter level
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration resolved once per process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
            module_path: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Read the `TILLKEEP_LOG_*` variables and publish level/debug to the
    /// global atomics the macros consult.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("TILLKEEP_DEBUG").unwrap_or(false);

        let level = env::var("TILLKEEP_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { defaults.level });

        let format = env::var("TILLKEEP_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(defaults.format);

        let config = Self {
            debug,
            level,
            format,
            timestamps: env_flag("TILLKEEP_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps),
            module_path: env_flag("TILLKEEP_LOG_MODULE").unwrap_or(defaults.module_path),
        };

        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
        config
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Force configuration from the environment now instead of on first record.
pub fn init() {
    Lazy::force(&CONFIG);
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Change the minimum level at runtime.
pub fn set_level(level: Level) {
    // Resolve env config first so a later lazy init cannot clobber this.
    init();
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Toggle debug mode at runtime. Enabling it lowers the level to `Debug`.
pub fn set_debug(enabled: bool) {
    init();
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        LOG_LEVEL.store(Level::Debug as u8, Ordering::SeqCst);
    }
}

pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Records
// ============================================================================

/// A single key-value pair attached to a record.
pub type Field<'a> = (&'a str, String);

/// Emit a record without structured fields.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    log_with_fields(level, target, message, &[]);
}

/// Emit a record with structured fields.
#[doc(hidden)]
pub fn log_with_fields(level: Level, target: &str, message: &str, fields: &[Field<'_>]) {
    let config = config();
    if !is_level_enabled(level) {
        return;
    }

    let line = render(config, level, target, message, fields);
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
}

/// Render a record to a single line according to `config`.
pub fn render(
    config: &LogConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
) -> String {
    match config.format {
        Format::Pretty => render_pretty(config, level, target, message, fields),
        Format::Compact => render_compact(config, level, target, message, fields),
        Format::Json => render_json(config, level, target, message, fields),
    }
}

fn render_pretty(
    config: &LogConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
) -> String {
    let mut out = String::new();
    if config.timestamps {
        out.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
    }
    out.push_str(&format!("{:5} ", level.as_str()));
    if config.module_path && !target.is_empty() {
        out.push_str(&format!("[{}] ", target));
    }
    out.push_str(message);
    for (key, value) in fields {
        out.push_str(&format!(" {}={}", key, value));
    }
    out
}

fn render_compact(
    config: &LogConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
) -> String {
    let mut out = String::new();
    if config.timestamps {
        out.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
    }
    out.push(level.as_str().chars().next().unwrap_or('?'));
    out.push(' ');
    if config.module_path && !target.is_empty() {
        out.push_str(target);
        out.push_str(": ");
    }
    out.push_str(message);
    for (key, value) in fields {
        out.push_str(&format!(" {}={}", key, value));
    }
    out
}

#[cfg(feature = "json")]
fn render_json(
    config: &LogConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
) -> String {
    let mut entry = serde_json::Map::new();
    if config.timestamps {
        entry.insert(
            "timestamp".into(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    entry.insert("level".into(), level.as_str().into());
    if config.module_path {
        entry.insert("target".into(), target.into());
    }
    entry.insert("message".into(), message.into());
    if !fields.is_empty() {
        let map = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::String(v.clone())))
            .collect();
        entry.insert("fields".into(), serde_json::Value::Object(map));
    }
    serde_json::Value::Object(entry).to_string()
}

#[cfg(not(feature = "json"))]
fn render_json(
    config: &LogConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
) -> String {
    let mut out = String::from("{");
    if config.timestamps {
        out.push_str(&format!(
            r#""timestamp":"{}","#,
            chrono::Utc::now().to_rfc3339()
        ));
    }
    out.push_str(&format!(r#""level":"{}","#, level.as_str()));
    if config.module_path {
        out.push_str(&format!(r#""target":"{}","#, escape_json(target)));
    }
    out.push_str(&format!(r#""message":"{}""#, escape_json(message)));
    if !fields.is_empty() {
        let rendered: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!(r#""{}":"{}""#, escape_json(k), escape_json(v)))
            .collect();
        out.push_str(&format!(r#","fields":{{{}}}"#, rendered.join(",")));
    }
    out.push('}');
    out
}

#[cfg(not(feature = "json"))]
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __tillkeep_log {
    ($level:expr, target: $target:expr, fields: { $($key:literal => $value:expr),* $(,)? }, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log_with_fields(
                $level,
                $target,
                &format!($($arg)+),
                &[$(($key, ($value).to_string())),*],
            );
        }
    };
    ($level:expr, fields: { $($key:literal => $value:expr),* $(,)? }, $($arg:tt)+) => {
        $crate::__tillkeep_log!($level, target: module_path!(), fields: { $($key => $value),* }, $($arg)+)
    };
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
    ($level:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a trace record.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__tillkeep_log!($crate::Level::Trace, $($arg)+) };
}

/// Log a debug record.
///
/// Enabled by `TILLKEEP_DEBUG=1` or `TILLKEEP_LOG_LEVEL=debug`.
///
/// ```rust
/// use tillkeep_log::debug;
///
/// let key = "abc";
/// debug!("Idempotency miss for key {}", key);
/// debug!(target: "tillkeep::store", "save raced, keeping first writer");
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        if $crate::is_debug_enabled() || $crate::is_level_enabled($crate::Level::Debug) {
            $crate::__tillkeep_log!($crate::Level::Debug, $($arg)+)
        }
    };
}

/// Log an info record.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__tillkeep_log!($crate::Level::Info, $($arg)+) };
}

/// Log a warning record.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__tillkeep_log!($crate::Level::Warn, $($arg)+) };
}

/// Log an error record.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__tillkeep_log!($crate::Level::Error, $($arg)+) };
}

// ============================================================================
// Tracing bridge
// ============================================================================

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! A `tracing` subscriber that honours the tillkeep level settings.

    use super::*;

    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let level = match current_level() {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(format: Format) -> LogConfig {
        LogConfig {
            debug: false,
            level: Level::Info,
            format,
            timestamps: false,
            module_path: true,
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("none"), Some(Level::Off));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("pretty"), Some(Format::Pretty));
        assert_eq!(Format::parse(" JSON "), Some(Format::Json));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_render_json_with_fields() {
        let line = render(
            &plain(Format::Json),
            Level::Warn,
            "tillkeep::reconcile",
            "Provider query failed",
            &[("shipment_id", "SHP-2".to_string())],
        );
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["target"], "tillkeep::reconcile");
        assert_eq!(parsed["fields"]["shipment_id"], "SHP-2");
        assert!(parsed.get("timestamp").is_none());
    }

    #[test]
    fn test_render_pretty_and_compact() {
        let fields = [("key", "abc".to_string())];
        let pretty = render(&plain(Format::Pretty), Level::Info, "t", "hit", &fields);
        assert_eq!(pretty, "INFO  [t] hit key=abc");

        let compact = render(&plain(Format::Compact), Level::Error, "t", "down", &[]);
        assert_eq!(compact, "E t: down");
    }

    #[test]
    fn test_set_level_and_debug() {
        let original = current_level();

        set_level(Level::Error);
        assert_eq!(current_level(), Level::Error);
        assert!(!is_level_enabled(Level::Warn));

        set_debug(true);
        assert!(is_debug_enabled());
        assert_eq!(current_level(), Level::Debug);

        set_debug(false);
        set_level(original);
    }

    #[test]
    fn test_macros_compile() {
        let id = "SHP-9";
        trace!("trace record");
        debug!("debug record {}", 1);
        info!(target: "test", "with target");
        warn!(fields: { "shipment_id" => id }, "with fields");
        error!(target: "test", fields: { "attempt" => 2, "key" => "k" }, "both {}", id);
    }
}
