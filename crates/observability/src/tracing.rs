//! Tracing/logging initialization.
//!
//! JSON lines by default, human-readable output with
//! `WATTCAST_LOG_FORMAT=pretty`. Filtering follows `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "WATTCAST_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown values fall back to JSON.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directive used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            format: std::env::var(FORMAT_ENV).map(|v| LogFormat::parse(&v)).unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_json() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" TEXT "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        init(&LogConfig::default());
        init(&LogConfig {
            format: LogFormat::Pretty,
            ..LogConfig::default()
        });
        ::tracing::info!("still logging");
    }
}
