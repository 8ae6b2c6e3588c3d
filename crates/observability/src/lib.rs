//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing with the default settings.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::LogConfig::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
