//! Import batch ledger model.
//!
//! Every county run produces exactly one `ImportBatch` row, so failures
//! are always auditable after the fact. A batch is created `running`,
//! transitions to `completed` or `failed` exactly once, and is immutable
//! thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-run record counters.
///
/// `skipped` counts records dropped for missing/invalid geometry or parcel
/// id; `failed` counts transform errors and records in batches that
/// exhausted their upsert retries. Skipped is never failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Total source records seen.
    pub processed: usize,
    /// Records upserted into staging.
    pub succeeded: usize,
    /// Records lost to transform or load errors.
    pub failed: usize,
    /// Records dropped before transformation (invalid geometry, no id).
    pub skipped: usize,
}

impl ImportStats {
    /// Merge counters from another run segment.
    pub fn merge(&mut self, other: &ImportStats) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Ledger entry for one county's import run.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub id: String,
    pub county_fips: String,
    pub status: BatchStatus,
    pub records_processed: usize,
    pub records_succeeded: usize,
    pub records_failed: usize,
    pub records_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_details: Option<String>,
}

impl ImportBatch {
    /// Create a new batch in the `running` state.
    pub fn start(county_fips: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            county_fips: county_fips.to_string(),
            status: BatchStatus::Running,
            records_processed: 0,
            records_succeeded: 0,
            records_failed: 0,
            records_skipped: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_details: None,
        }
    }

    /// Finalize as completed with the run's counters.
    pub fn complete(&mut self, stats: &ImportStats) {
        debug_assert!(!self.status.is_terminal());
        self.apply_stats(stats);
        self.status = BatchStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Finalize as failed, keeping whatever counters were reached.
    pub fn fail(&mut self, stats: &ImportStats, error: String) {
        debug_assert!(!self.status.is_terminal());
        self.apply_stats(stats);
        self.status = BatchStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_details = Some(error);
    }

    fn apply_stats(&mut self, stats: &ImportStats) {
        self.records_processed = stats.processed;
        self.records_succeeded = stats.succeeded;
        self.records_failed = stats.failed;
        self.records_skipped = stats.skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [BatchStatus::Running, BatchStatus::Completed, BatchStatus::Failed] {
            assert_eq!(BatchStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BatchStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_lifecycle() {
        let mut batch = ImportBatch::start("12015");
        assert_eq!(batch.status, BatchStatus::Running);
        assert!(batch.completed_at.is_none());

        let stats = ImportStats {
            processed: 100,
            succeeded: 95,
            failed: 2,
            skipped: 3,
        };
        batch.complete(&stats);
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.records_succeeded, 95);
        assert_eq!(batch.records_skipped, 3);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_fail_keeps_error() {
        let mut batch = ImportBatch::start("12071");
        batch.fail(&ImportStats::default(), "too many transform errors".to_string());
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(
            batch.error_details.as_deref(),
            Some("too many transform errors")
        );
    }

    #[test]
    fn test_stats_merge() {
        let mut a = ImportStats {
            processed: 10,
            succeeded: 8,
            failed: 1,
            skipped: 1,
        };
        let b = ImportStats {
            processed: 5,
            succeeded: 5,
            failed: 0,
            skipped: 0,
        };
        a.merge(&b);
        assert_eq!(a.processed, 15);
        assert_eq!(a.succeeded, 13);
    }
}
