// Tracing initialization. `log` records from the library are bridged in.
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    // Prefer RUST_LOG from env, otherwise use the level implied by --verbose.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    #[cfg(feature = "logs-json")]
    let layer = fmt::layer().json().with_writer(std::io::stderr);
    #[cfg(not(feature = "logs-json"))]
    let layer = fmt::layer().with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
