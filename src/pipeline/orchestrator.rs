//! Multi-county orchestration.
//!
//! Counties are fully isolated from one another: each run gets its own
//! ledger entry, its own staging rows, and its own error budget, and a
//! failed county never prevents its siblings from running. A shared
//! shutdown flag drains the queue gracefully; in-flight batches finish,
//! new work is not started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::errors::PipelineError;
use crate::models::{CountyQueueEntry, ImportBatch, ImportStats};
use crate::pipeline::CountyPipeline;
use crate::repository::{CountyRepository, ImportBatchRepository, ParcelRepository};

pub struct Orchestrator {
    settings: Settings,
    parcels: Arc<ParcelRepository>,
    ledger: Arc<ImportBatchRepository>,
    counties: Arc<CountyRepository>,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> crate::repository::Result<Self> {
        let db_path = settings.database_path();
        Ok(Self {
            parcels: Arc::new(ParcelRepository::new(&db_path)?),
            ledger: Arc::new(ImportBatchRepository::new(&db_path)?),
            counties: Arc::new(CountyRepository::new(&db_path)?),
            shutdown: Arc::new(AtomicBool::new(false)),
            settings,
        })
    }

    /// Flag checked between batches; raise it to drain gracefully.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Import one county into staging, recording the run in the ledger and
    /// adjusting the county's queue priority.
    ///
    /// Pipeline failures are captured in the returned batch (status
    /// `failed`), not raised; only ledger/store failures error out.
    pub async fn process_county(&self, fips_code: &str) -> Result<ImportBatch, PipelineError> {
        let mut entry = match self.counties.get(fips_code)? {
            Some(entry) => entry,
            None => {
                // Unregistered county: track it from this run onward
                let entry = CountyQueueEntry::new(fips_code, fips_code, 0);
                self.counties.save(&entry)?;
                entry
            }
        };

        let mut batch = ImportBatch::start(fips_code);
        self.ledger.create(&batch)?;

        let pipeline = CountyPipeline::new(self.parcels.clone(), self.settings.pipeline.clone());
        let source_dir = self.settings.county_source_dir(fips_code);
        let mut stats = ImportStats::default();
        let result = pipeline
            .run(fips_code, &source_dir, &batch.id, &self.shutdown, &mut stats)
            .await;

        let success = match result {
            Ok(()) => {
                batch.complete(&stats);
                true
            }
            Err(e) => {
                warn!(county_fips = fips_code, error = %e, "county import failed");
                batch.fail(&stats, e.to_string());
                false
            }
        };
        self.ledger.finalize(&batch)?;

        entry.record_run(success);
        self.counties.save(&entry)?;

        Ok(batch)
    }

    /// Import every queued county, bounded by `max_concurrent_counties`.
    /// Counties start in queue-priority order; each finishes regardless of
    /// how its siblings fare.
    pub async fn process_all(self: &Arc<Self>) -> Result<Vec<ImportBatch>, PipelineError> {
        let entries = self.counties.list()?;
        if entries.is_empty() {
            info!("county queue is empty, nothing to import");
            return Ok(Vec::new());
        }

        let permits = self.settings.pipeline.max_concurrent_counties.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let results: Arc<Mutex<Vec<ImportBatch>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let orchestrator = self.clone();
            let semaphore = semaphore.clone();
            let results = results.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if orchestrator.shutdown.load(Ordering::Relaxed) {
                    info!(county_fips = %entry.fips_code, "shutdown requested, skipping county");
                    return;
                }

                match orchestrator.process_county(&entry.fips_code).await {
                    Ok(batch) => results.lock().await.push(batch),
                    // Store errors are isolated to this county too
                    Err(e) => error!(county_fips = %entry.fips_code, error = %e, "county run errored"),
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "county worker panicked");
            }
        }

        let mut batches = Arc::try_unwrap(results)
            .map(Mutex::into_inner)
            .unwrap_or_default();
        batches.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(batches)
    }
}
