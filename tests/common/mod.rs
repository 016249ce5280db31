//! Shared utilities for integration testing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use rpclink::transport::{LimitsConfig, TransportLimits};

static DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Install a tracing subscriber once for the whole test binary.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpclink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A fresh scratch directory for this test process.
pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "rpclink-test-{}-{}",
        std::process::id(),
        DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Resolved limits with small ceilings suitable for tests.
#[allow(dead_code)]
pub fn test_limits(max_connections: u32) -> TransportLimits {
    TransportLimits::resolve(
        &LimitsConfig {
            max_concurrent_connections: Some(max_connections),
            max_concurrent_upgraded_connections: Some(max_connections),
            ..LimitsConfig::default()
        },
        1,
    )
    .unwrap()
}

/// Mint a self-signed certificate for `localhost` and write it as PEM
/// files. Returns (cert_path, key_path).
#[allow(dead_code)]
pub fn self_signed_pem() -> (PathBuf, PathBuf) {
    let signed = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = scratch_dir();
    let cert_path = dir.join("server.pem");
    let key_path = dir.join("server.key");
    std::fs::write(&cert_path, signed.cert.pem()).unwrap();
    std::fs::write(&key_path, signed.key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}
