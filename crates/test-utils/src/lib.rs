pub mod builders;
pub mod loopback;

use std::sync::{Arc, Once};
use std::time::Duration;

use execmon::exec::remote::{PoolConfig, SessionPool};
use execmon::exec::{Executors, LocalExecutor, RemoteExecutor};
use execmon::record::{RecordHandle, RecordSnapshot};
use tracing_subscriber::{EnvFilter, fmt};

pub use loopback::LoopbackTransport;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `record` until its exit status is set and return the final snapshot.
///
/// Panics after 5 seconds.
pub async fn wait_settled(record: &RecordHandle) -> RecordSnapshot {
    with_timeout(async {
        loop {
            let snapshot = record.snapshot();
            if snapshot.is_settled() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// A session pool over `transport` with the given capacity.
pub fn loopback_pool(transport: &LoopbackTransport, capacity: usize) -> Arc<SessionPool> {
    Arc::new(SessionPool::new(
        Arc::new(transport.clone()),
        PoolConfig {
            capacity,
            probe_timeout: Duration::from_secs(1),
        },
    ))
}

/// Local executor plus a remote executor over `transport`.
pub fn loopback_executors(transport: &LoopbackTransport, read_timeout: Duration) -> Executors {
    Executors::new(
        LocalExecutor::new(),
        RemoteExecutor::new(loopback_pool(transport, 4), read_timeout),
    )
}

/// Owned argument vector from string literals.
pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
