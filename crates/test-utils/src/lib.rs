//! Shared helpers for `procgate` integration tests.

pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use procgate::logging::{LOG_ENV, build_filter};
use tracing_subscriber::fmt;

/// Upper bound for any single test scenario. Generous because real-process
/// tests spawn shells.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const TEST_DIRECTIVES: &str = "procgate=debug";

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Reads `PROCGATE_LOG` like the binary does (e.g.
/// `PROCGATE_LOG=procgate::exec::gate=trace cargo test`); without it the
/// crate logs at `debug`. Output is only shown for failing tests unless run
/// with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env = std::env::var(LOG_ENV).ok();
        let filter = build_filter(None, Some(env.as_deref().unwrap_or(TEST_DIRECTIVES)))
            .unwrap_or_else(|e| panic!("bad {LOG_ENV} for tests: {e:#}"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `fut`, failing the test if it takes longer than `limit`.
pub async fn within<F, T>(limit: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(out) => out,
        Err(_) => panic!("scenario did not finish within {limit:?}; a task or permit leaked"),
    }
}

/// [`within`] using [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    within(TEST_TIMEOUT, fut).await
}
