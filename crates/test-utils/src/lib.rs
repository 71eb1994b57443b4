//! Shared helpers for taskgate integration tests.

pub mod builders;
pub mod recorder;

pub use recorder::EventRecorder;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "warn,taskgate=info";

/// Upper bound for any single awaited scheduler operation in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so the harness only prints them for
/// failing tests (or with `-- --nocapture`). Override the filter with e.g.
/// `RUST_LOG=taskgate=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test after [`TEST_TIMEOUT`].
///
/// With `start_paused = true` the timeout runs on the paused clock, so a
/// stuck scheduler fails the test immediately instead of hanging it.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_TIMEOUT:?}"))
}
