//! County queue model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduling metadata for one county.
///
/// Lower `processing_priority` means sooner. The orchestrator bumps the
/// priority after each run: +1 on success (processed later next time),
/// -1 floored at zero on failure (retried sooner on the next invocation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyQueueEntry {
    /// Five-digit county FIPS code.
    pub fips_code: String,
    /// Human-readable county name.
    pub name: String,
    pub processing_priority: i64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl CountyQueueEntry {
    pub fn new(fips_code: &str, name: &str, priority: i64) -> Self {
        Self {
            fips_code: fips_code.to_string(),
            name: name.to_string(),
            processing_priority: priority,
            last_processed_at: None,
        }
    }

    /// Adjust scheduling state after a run.
    pub fn record_run(&mut self, success: bool) {
        self.processing_priority = if success {
            self.processing_priority + 1
        } else {
            (self.processing_priority - 1).max(0)
        };
        self.last_processed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_adjustment() {
        let mut county = CountyQueueEntry::new("12015", "Charlotte", 5);

        county.record_run(true);
        assert_eq!(county.processing_priority, 6);
        assert!(county.last_processed_at.is_some());

        county.record_run(false);
        assert_eq!(county.processing_priority, 5);
    }

    #[test]
    fn test_priority_floor() {
        let mut county = CountyQueueEntry::new("12086", "Miami-Dade", 0);
        county.record_run(false);
        assert_eq!(county.processing_priority, 0);
    }
}
