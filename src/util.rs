use tracing_subscriber::{EnvFilter, fmt};

/// Diagnostics go to stderr so the rendered status line on stdout stays
/// machine-consumable. Silent unless RUST_LOG asks for more.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
