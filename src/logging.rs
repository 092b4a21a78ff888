//! Tracing setup for the coordinator binary.
//!
//! Mirrors the teacher's span-per-component convention (`COMPONENT_KEY`)
//! but built on `tracing` rather than the older `slog` snapshots found
//! elsewhere in this repo's history.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Span field name used on every component's top-level span, so log
/// aggregators can group by component the same way the teacher's `slog`
/// output does via `o!(COMPONENT_KEY => ...)`.
pub const COMPONENT_KEY: &str = "component";

pub fn init(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(true);

	if json {
		subscriber.json().init();
	} else {
		subscriber.init();
	}
}

#[cfg(test)]
pub mod test_utils {
	pub fn init_test_logging() {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	}
}
