//! blobdrop logging setup
//!
//! Every blobdrop crate logs through `tracing`. This crate installs a
//! `tracing-subscriber` formatter configured from the environment.
//!
//! # Usage
//!
//! ```rust
//! // Reads BLOBDROP_* variables; safe to call more than once.
//! blobdrop_log::init();
//!
//! tracing::info!(container = "photos", "uploader ready");
//! ```
//!
//! # Environment Variables
//!
//! - `BLOBDROP_DEBUG=1` - Enable debug logging
//! - `BLOBDROP_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `BLOBDROP_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `BLOBDROP_LOG_COLOR=1|0` - Enable/disable colors
//! - `RUST_LOG` - Full filter directive, overrides the level when set

use once_cell::sync::OnceCell;
use std::env;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level for blobdrop logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// No logging
    Off,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Filter directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Single-line output
    Compact,
    /// JSON lines for structured logging
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
        }
    }
}

impl LogConfig {
    /// Create config from `BLOBDROP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("BLOBDROP_DEBUG").unwrap_or(false);

        let level = lookup("BLOBDROP_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("BLOBDROP_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("BLOBDROP_LOG_COLOR").unwrap_or_else(|| {
            format != Format::Json && lookup("NO_COLOR").is_none() && lookup("TERM").is_some()
        });

        Self {
            debug,
            level,
            format,
            color,
        }
    }

    /// Build the filter, letting `RUST_LOG` take precedence.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

// ============================================================================
// Public API
// ============================================================================

static INSTALLED: OnceCell<LogConfig> = OnceCell::new();

/// Initialize logging from the environment.
///
/// Returns `true` when this call installed the global subscriber and
/// `false` when a subscriber was already in place.
pub fn init() -> bool {
    init_with(LogConfig::from_env())
}

/// Initialize logging with an explicit configuration.
pub fn init_with(config: LogConfig) -> bool {
    let mut installed = false;

    INSTALLED.get_or_init(|| {
        installed = install(&config);
        config
    });

    installed
}

/// The configuration of the first `init` call, if any.
pub fn config() -> Option<&'static LogConfig> {
    INSTALLED.get()
}

fn install(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_ansi(config.color)
        .with_writer(std::io::stderr);

    // A subscriber set elsewhere (tests, host application) wins.
    let result = match config.format {
        Format::Json => builder.json().try_init(),
        Format::Compact => builder.compact().try_init(),
        Format::Pretty => builder.pretty().try_init(),
    };

    result.is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
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
        assert_eq!(Format::parse("compact"), Some(Format::Compact));
        assert_eq!(Format::parse("JSON"), Some(Format::Json));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_defaults_without_env() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_debug_flag_lowers_level() {
        let config = LogConfig::from_lookup(lookup(&[("BLOBDROP_DEBUG", "true")]));
        assert!(config.debug);
        assert_eq!(config.level, Level::Debug);

        let explicit = LogConfig::from_lookup(lookup(&[
            ("BLOBDROP_DEBUG", "1"),
            ("BLOBDROP_LOG_LEVEL", "warn"),
        ]));
        assert_eq!(explicit.level, Level::Warn);
    }

    #[test]
    fn test_color_follows_terminal_for_text_formats() {
        let config = LogConfig::from_lookup(lookup(&[
            ("BLOBDROP_LOG_FORMAT", "pretty"),
            ("TERM", "xterm-256color"),
        ]));
        assert_eq!(config.format, Format::Pretty);
        assert!(config.color);

        let no_color = LogConfig::from_lookup(lookup(&[
            ("BLOBDROP_LOG_FORMAT", "pretty"),
            ("TERM", "xterm-256color"),
            ("NO_COLOR", "1"),
        ]));
        assert!(!no_color.color);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_with(LogConfig {
            level: Level::Off,
            ..LogConfig::default()
        });
        assert!(!init());
        assert!(config().is_some());
    }
}
