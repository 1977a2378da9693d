use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{error, info};

use ragspace_core::domain::DocumentStatus;
use ragspace_core::ingestion::{ProcessDocumentUseCase, ProcessOutcome};
use ragspace_core::ports::queue::ProcessingJob;
use ragspace_core::ports::DocumentRepository;

use crate::metrics::Metrics;

const SWEEP_BATCH_SIZE: i64 = 32;
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// Polling worker: sweeps PENDING documents from the database and runs the
/// processing use case on each. The compare-and-set claim makes concurrent
/// workers safe; a lost claim is just a no-op here.
pub struct Worker {
    documents: Arc<dyn DocumentRepository>,
    processor: ProcessDocumentUseCase,
    metrics: Metrics,
}

impl Worker {
    pub fn new(documents: Arc<dyn DocumentRepository>, processor: ProcessDocumentUseCase) -> Self {
        Self {
            documents,
            processor,
            metrics: Metrics::new(),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("worker started");
        let mut last_summary = Instant::now();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
                swept = self.sweep_once() => {
                    match swept {
                        Ok(0) => tokio::time::sleep(SWEEP_INTERVAL).await,
                        Ok(count) => info!(count, "sweep processed documents"),
                        Err(e) => {
                            error!(error = %e, "sweep failed");
                            tokio::time::sleep(SWEEP_INTERVAL).await;
                        }
                    }
                }
            }

            if last_summary.elapsed() >= SUMMARY_INTERVAL {
                self.metrics.log_summary();
                last_summary = Instant::now();
            }
        }

        self.metrics.log_summary();
        info!("worker stopped");
        Ok(())
    }

    /// One pass over currently-PENDING documents.
    pub async fn sweep_once(&self) -> Result<usize> {
        let pending = self
            .documents
            .find_documents_in_status(DocumentStatus::Pending, SWEEP_BATCH_SIZE)
            .await?;

        let mut processed = 0usize;
        for document in pending {
            let job = ProcessingJob {
                document_id: document.id,
                workspace_id: document.workspace_id,
            };

            let started = Instant::now();
            match self.processor.execute(&job).await {
                Ok(outcome) => {
                    self.metrics.record_duration(started.elapsed());
                    match outcome {
                        ProcessOutcome::Ready { chunks_created } => {
                            self.metrics.record_ready(chunks_created as u64);
                        }
                        ProcessOutcome::Failed { .. } => self.metrics.record_failed(),
                        ProcessOutcome::Invalid => self.metrics.record_invalid(),
                        ProcessOutcome::Missing => self.metrics.record_missing(),
                        ProcessOutcome::Noop { .. } => self.metrics.record_noop(),
                    }
                    processed += 1;
                }
                Err(e) => {
                    error!(document_id = %job.document_id, error = %e, "job execution error");
                }
            }
        }

        Ok(processed)
    }
}
