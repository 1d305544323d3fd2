//! Tracing setup for binaries and tests that drive the clearing engine.

use tracing_subscriber::EnvFilter;

/// Initialize a stderr fmt subscriber.
///
/// Respects `RUST_LOG`; falls back to `default_directive` (e.g. `"info"` or
/// `"mce_algo=debug"`). Returns `false` if a global subscriber was already
/// installed, which is harmless when several tests call this.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
