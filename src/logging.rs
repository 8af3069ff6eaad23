//! Tracing setup for hosts embedding the core

use tracing_subscriber::EnvFilter;

/// Install the default subscriber: warnings and above to stderr, with
/// `RUST_LOG` overrides. Later calls are no-ops, so hosts and tests can
/// call this unconditionally.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Like [`init`] but defaulting to debug level, for development hosts
pub fn init_debug() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
