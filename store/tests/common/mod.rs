//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use schooldb_store::{
    Database, Fields, ManualClock, MemoryBackend, SequentialIds, StoreConfig, WriteMode,
};
use serde_json::Value;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Everything a test needs to drive a database deterministically.
pub struct Harness {
    pub db: Database,
    pub backend: Arc<MemoryBackend>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(config: StoreConfig) -> Harness {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let db = Database::builder(backend.clone())
        .config(config)
        .clock(clock.clone())
        .ids(Arc::new(SequentialIds::new("gen")))
        .build();
    Harness { db, backend, clock }
}

/// No latency, writes go straight to the base snapshot.
pub fn fast_config() -> StoreConfig {
    StoreConfig::default().with_latency(Duration::ZERO)
}

pub fn queued_config() -> StoreConfig {
    fast_config().with_write_mode(WriteMode::Queued)
}

pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}
