//! Batched staging loader.
//!
//! Records stream in one at a time and land in staging in fixed-size
//! transactional chunks; nothing beyond the current chunk is buffered. A
//! chunk that fails its upsert is retried with exponential backoff; a chunk
//! that exhausts its retries is counted failed and the loader moves on, so
//! one poisoned batch costs at most `batch_size` records. Counters advance
//! on the shared stats as each chunk lands, so the caller can enforce its
//! error budget between chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::models::{ImportStats, ParcelRecord};
use crate::repository::{ParcelRepository, ParcelTable};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

pub struct BatchLoader {
    repo: Arc<ParcelRepository>,
    batch_size: usize,
    max_retries: u32,
    batch_delay: Duration,
    buffer: Vec<ParcelRecord>,
    chunks_loaded: usize,
}

impl BatchLoader {
    pub fn new(repo: Arc<ParcelRepository>, config: &PipelineConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            repo,
            // A zero batch size would chunk nothing; treat it as one
            batch_size,
            max_retries: config.max_retries,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            buffer: Vec::with_capacity(batch_size),
            chunks_loaded: 0,
        }
    }

    /// Buffer one record, flushing to staging when a full chunk is ready.
    pub async fn push(
        &mut self,
        record: ParcelRecord,
        shutdown: &AtomicBool,
        stats: &mut ImportStats,
    ) -> Result<(), PipelineError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush(shutdown, stats).await?;
        }
        Ok(())
    }

    /// Flush the buffered remainder. Call once after the last `push`.
    pub async fn finish(
        &mut self,
        shutdown: &AtomicBool,
        stats: &mut ImportStats,
    ) -> Result<(), PipelineError> {
        self.flush(shutdown, stats).await
    }

    /// Returns `Cancelled` only when the shutdown flag is raised between
    /// chunks; an in-flight chunk always runs to completion so no
    /// transaction is torn.
    async fn flush(
        &mut self,
        shutdown: &AtomicBool,
        stats: &mut ImportStats,
    ) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        if shutdown.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled);
        }

        // Pace between chunks to keep the writer from starving readers
        if self.chunks_loaded > 0 && !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }

        let loaded = self.buffer.len();
        if self.load_chunk().await {
            stats.succeeded += loaded;
        } else {
            stats.failed += loaded;
        }
        self.chunks_loaded += 1;
        self.buffer.clear();
        Ok(())
    }

    async fn load_chunk(&self) -> bool {
        for attempt in 0..=self.max_retries {
            match self.repo.upsert_batch(ParcelTable::Staging, &self.buffer) {
                Ok(count) => {
                    debug!(records = count, attempt, "staged batch");
                    return true;
                }
                Err(e) if attempt < self.max_retries => {
                    let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "batch upsert failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        records = self.buffer.len(),
                        "batch upsert failed after {} retries, dropping batch",
                        self.max_retries
                    );
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::parcel::test_support::sample_record;

    fn setup(config: &PipelineConfig) -> (tempfile::TempDir, Arc<ParcelRepository>, BatchLoader) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(ParcelRepository::new(&dir.path().join("parcels.db")).unwrap());
        let loader = BatchLoader::new(repo.clone(), config);
        (dir, repo, loader)
    }

    async fn push_all(
        loader: &mut BatchLoader,
        n: usize,
        shutdown: &AtomicBool,
        stats: &mut ImportStats,
    ) -> Result<(), PipelineError> {
        for i in 0..n {
            loader
                .push(sample_record(&format!("P-{i}"), "12086"), shutdown, stats)
                .await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_loads_in_chunks() {
        let config = PipelineConfig {
            batch_size: 3,
            batch_delay_ms: 0,
            ..Default::default()
        };
        let (_dir, repo, mut loader) = setup(&config);
        let shutdown = AtomicBool::new(false);
        let mut stats = ImportStats::default();

        push_all(&mut loader, 8, &shutdown, &mut stats).await.unwrap();
        loader.finish(&shutdown, &mut stats).await.unwrap();

        assert_eq!(stats.succeeded, 8);
        assert_eq!(stats.failed, 0);
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 8);
    }

    #[tokio::test]
    async fn test_stats_advance_per_chunk() {
        let config = PipelineConfig {
            batch_size: 2,
            batch_delay_ms: 0,
            ..Default::default()
        };
        let (_dir, repo, mut loader) = setup(&config);
        let shutdown = AtomicBool::new(false);
        let mut stats = ImportStats::default();

        // Full chunks land as soon as they fill, not at finish
        push_all(&mut loader, 3, &shutdown, &mut stats).await.unwrap();
        assert_eq!(stats.succeeded, 2);
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 2);

        loader.finish(&shutdown, &mut stats).await.unwrap();
        assert_eq!(stats.succeeded, 3);
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_partial_not_fatal() {
        let config = PipelineConfig {
            batch_size: 10,
            max_retries: 1,
            batch_delay_ms: 0,
            ..Default::default()
        };
        let (dir, _repo, mut loader) = setup(&config);

        // Remove the staging table out from under the loader
        let conn = crate::repository::connect(&dir.path().join("parcels.db")).unwrap();
        conn.execute_batch("DROP TABLE parcels_staging;").unwrap();

        let shutdown = AtomicBool::new(false);
        let mut stats = ImportStats::default();
        push_all(&mut loader, 4, &shutdown, &mut stats).await.unwrap();
        loader.finish(&shutdown, &mut stats).await.unwrap();

        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.failed, 4);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_flush() {
        let config = PipelineConfig {
            batch_delay_ms: 0,
            ..Default::default()
        };
        let (_dir, repo, mut loader) = setup(&config);
        let shutdown = AtomicBool::new(true);
        let mut stats = ImportStats::default();

        push_all(&mut loader, 2, &shutdown, &mut stats).await.unwrap();
        let err = loader.finish(&shutdown, &mut stats).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_finish_without_records_is_noop() {
        let (_dir, _repo, mut loader) = setup(&PipelineConfig::default());
        let mut stats = ImportStats::default();
        loader
            .finish(&AtomicBool::new(false), &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.failed, 0);
    }
}
