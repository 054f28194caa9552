//! Logging prelude for convenient access to tracing macros.
//!
//! Re-exports the common tracing macros so modules can pull everything in
//! with one `use crate::logging::*;`.

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO and above by default; control the level with `RUST_LOG`:
///
/// ```bash
/// RUST_LOG=debug reflectr sync a b:/c
/// RUST_LOG=reflectr::sync=trace reflectr serve /data
/// ```
///
/// Output goes to stderr so that `serve` mode keeps stdout clean for the
/// peer protocol.
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
