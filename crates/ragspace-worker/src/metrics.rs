use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

/// Process-wide job counters, cheap to clone across worker tasks.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    documents_ready: AtomicU64,
    documents_failed: AtomicU64,
    documents_invalid: AtomicU64,
    documents_missing: AtomicU64,
    documents_noop: AtomicU64,
    chunks_created: AtomicU64,
    total_processing_time_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                documents_ready: AtomicU64::new(0),
                documents_failed: AtomicU64::new(0),
                documents_invalid: AtomicU64::new(0),
                documents_missing: AtomicU64::new(0),
                documents_noop: AtomicU64::new(0),
                chunks_created: AtomicU64::new(0),
                total_processing_time_ms: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_ready(&self, chunks: u64) {
        self.inner.documents_ready.fetch_add(1, Ordering::Relaxed);
        self.inner.chunks_created.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.inner.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.inner.documents_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missing(&self) {
        self.inner.documents_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_noop(&self) {
        self.inner.documents_noop.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duration(&self, duration: Duration) {
        self.inner
            .total_processing_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn total_processed(&self) -> u64 {
        self.inner.documents_ready.load(Ordering::Relaxed)
            + self.inner.documents_failed.load(Ordering::Relaxed)
            + self.inner.documents_invalid.load(Ordering::Relaxed)
            + self.inner.documents_missing.load(Ordering::Relaxed)
            + self.inner.documents_noop.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        info!(
            ready = self.inner.documents_ready.load(Ordering::Relaxed),
            failed = self.inner.documents_failed.load(Ordering::Relaxed),
            invalid = self.inner.documents_invalid.load(Ordering::Relaxed),
            missing = self.inner.documents_missing.load(Ordering::Relaxed),
            noop = self.inner.documents_noop.load(Ordering::Relaxed),
            chunks_created = self.inner.chunks_created.load(Ordering::Relaxed),
            total_processing_ms = self.inner.total_processing_time_ms.load(Ordering::Relaxed),
            total_processed = self.total_processed(),
            "worker metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
