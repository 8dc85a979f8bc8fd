//! Structured JSON logging setup.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global JSON subscriber.
///
/// Call once at startup, before any requests are served. Repeat calls (as
/// happens across tests) are harmless no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(false))
        .try_init();
}
