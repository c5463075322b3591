use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber, writing to stderr.
///
/// Reads `RUST_LOG` (or `DOCCHAT_LOG`) to set the filter, falling back to
/// `default_level`. Stdout stays reserved for command output.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("DOCCHAT_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
