//! Per-stage wall-clock measurements for the retrieval and answer flows.

use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone)]
pub struct StageTimings {
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a future and record its duration under `stage`.
    pub async fn measure<F, T>(&mut self, stage: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.record(stage, start.elapsed());
        out
    }

    /// Run a closure and record its duration under `stage`.
    pub fn measure_sync<F, T>(&mut self, stage: &'static str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        out
    }

    pub fn record(&mut self, stage: &'static str, duration: Duration) {
        self.stages.push((stage, duration));
    }

    pub fn get_ms(&self, stage: &str) -> Option<u64> {
        self.stages
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, d)| d.as_millis() as u64)
    }

    /// `(stage_ms, value)` pairs for structured log fields.
    pub fn as_fields(&self) -> Vec<(String, u64)> {
        self.stages
            .iter()
            .map(|(name, d)| (format!("{name}_ms"), d.as_millis() as u64))
            .collect()
    }

    pub fn total_ms(&self) -> u64 {
        self.stages
            .iter()
            .map(|(_, d)| d.as_millis() as u64)
            .sum()
    }
}
