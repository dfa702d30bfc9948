//! Helpers shared by unit and integration tests.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Routes `tracing` output through the test harness's captured writer.
///
/// `RUST_LOG` wins over `level`; with neither set only warnings are shown.
/// Safe to call from every test, only the first call installs a subscriber.
pub fn init_test_logging(level: Option<Level>) {
    INIT.call_once(|| {
        let default = level.unwrap_or(Level::WARN).to_string().to_lowercase();
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
