//! Logging setup for native consumers and dev tooling.
//!
//! Only available with the `logging` feature. Library users: vireo emits
//! tracing events - install your own subscriber. The browser runtime ships
//! its own console forwarding instead.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize logging from the `RUST_LOG` environment variable, defaulting
/// to `info`. Safe to call more than once; only the first call takes effect.
pub fn init_logging_from_env() {
    init_logging_with_default("info");
}

/// Initialize logging with an explicit default directive (e.g.
/// `"vireo_router=debug"`), still overridable through `RUST_LOG`.
pub fn init_logging_with_default(default_directive: &str) {
    // EnvFilter::new ignores invalid directives, so this cannot fail.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}
