//! County import pipeline.
//!
//! One run streams every source file in a county directory record by
//! record: validate, transform, and hand to the loader, which stages a
//! chunk as soon as one fills. Nothing beyond one chunk is ever held in
//! memory, so a million-parcel county costs the same as a small one.
//! Counters distinguish records dropped before transformation (`skipped`)
//! from records lost to errors (`failed`); only the latter count against
//! the county's error budget, which is checked as each record and each
//! chunk lands.

pub mod loader;
pub mod orchestrator;

pub use loader::BatchLoader;
pub use orchestrator::Orchestrator;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, SourceError};
use crate::geometry;
use crate::models::ImportStats;
use crate::repository::{ParcelRepository, ParcelTable};
use crate::sources::{self, SourceKind};
use crate::transform::{TransformContext, Transformer};

/// Executes a single county's import into staging.
pub struct CountyPipeline {
    repo: Arc<ParcelRepository>,
    config: PipelineConfig,
    transformer: Transformer,
}

impl CountyPipeline {
    pub fn new(repo: Arc<ParcelRepository>, config: PipelineConfig) -> Self {
        Self {
            repo,
            config,
            transformer: Transformer::new(),
        }
    }

    /// Run the county import. Counters accumulate into `stats` as the run
    /// progresses, so a failed run still reports how far it got.
    pub async fn run(
        &self,
        county_fips: &str,
        source_dir: &Path,
        batch_id: &str,
        shutdown: &AtomicBool,
        stats: &mut ImportStats,
    ) -> Result<(), PipelineError> {
        let kind = SourceKind::detect(source_dir)?;
        let files = sources::open_dir(source_dir, kind)?;
        info!(
            county_fips,
            format = kind.as_str(),
            files = files.len(),
            "starting county import"
        );

        let ctx = TransformContext {
            county_fips: county_fips.to_string(),
            import_batch_id: batch_id.to_string(),
            data_vintage: self.config.vintage(),
            simplification_tolerance: self.config.simplification_tolerance,
        };

        // Replace semantics: a re-import must not leave stale rows from the
        // county's previous staging pass.
        self.repo.delete_county(ParcelTable::Staging, county_fips)?;

        let mut loader = BatchLoader::new(self.repo.clone(), &self.config);
        for file in &files {
            let iter = match file.read() {
                Ok(iter) => iter,
                // One unreadable file never aborts its siblings
                Err(e @ SourceError::Parse { .. }) => {
                    warn!(error = %e, "skipping unreadable source file");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for raw in iter {
                stats.processed += 1;

                let geometry = match &raw.geometry {
                    Some(g) if geometry::validate(g) => g.clone(),
                    _ => {
                        stats.skipped += 1;
                        continue;
                    }
                };
                if !self.transformer.has_parcel_id(&raw) {
                    stats.skipped += 1;
                    continue;
                }

                match self.transformer.transform(&raw, geometry, &ctx) {
                    Ok(record) => loader.push(record, shutdown, stats).await?,
                    Err(e) => {
                        stats.failed += 1;
                        debug!(error = %e, source_file = %raw.source_file, "record failed transform");
                    }
                }

                self.check_error_budget(stats)?;
            }
        }

        loader.finish(shutdown, stats).await?;
        self.check_error_budget(stats)?;

        info!(
            county_fips,
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "county import finished"
        );
        Ok(())
    }

    fn check_error_budget(&self, stats: &ImportStats) -> Result<(), PipelineError> {
        if stats.failed > self.config.error_threshold {
            return Err(PipelineError::TooManyTransformErrors {
                errors: stats.failed,
                threshold: self.config.error_threshold,
            });
        }
        Ok(())
    }
}
