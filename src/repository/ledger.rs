//! Import batch ledger repository.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{parse_datetime, parse_datetime_opt, Result};
use crate::models::{BatchStatus, ImportBatch};

/// SQLite-backed ledger of county import runs.
pub struct ImportBatchRepository {
    db_path: PathBuf,
}

impl ImportBatchRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_batches (
                id TEXT PRIMARY KEY,
                county_fips TEXT NOT NULL,
                status TEXT NOT NULL,
                records_processed INTEGER NOT NULL DEFAULT 0,
                records_succeeded INTEGER NOT NULL DEFAULT 0,
                records_failed INTEGER NOT NULL DEFAULT 0,
                records_skipped INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error_details TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_import_batches_county
                ON import_batches(county_fips);
            "#,
        )?;
        Ok(())
    }

    /// Record a newly started batch.
    pub fn create(&self, batch: &ImportBatch) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO import_batches
                (id, county_fips, status, records_processed, records_succeeded,
                 records_failed, records_skipped, started_at, completed_at, error_details)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch.id,
                batch.county_fips,
                batch.status.as_str(),
                batch.records_processed as i64,
                batch.records_succeeded as i64,
                batch.records_failed as i64,
                batch.records_skipped as i64,
                batch.started_at.to_rfc3339(),
                batch.completed_at.map(|dt| dt.to_rfc3339()),
                batch.error_details,
            ],
        )?;
        Ok(())
    }

    /// Persist a batch's terminal state. Guarded on the `running` status so
    /// a batch is finalized at most once; returns false if it already was.
    pub fn finalize(&self, batch: &ImportBatch) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE import_batches SET
                status = ?2,
                records_processed = ?3,
                records_succeeded = ?4,
                records_failed = ?5,
                records_skipped = ?6,
                completed_at = ?7,
                error_details = ?8
            WHERE id = ?1 AND status = 'running'
            "#,
            params![
                batch.id,
                batch.status.as_str(),
                batch.records_processed as i64,
                batch.records_succeeded as i64,
                batch.records_failed as i64,
                batch.records_skipped as i64,
                batch.completed_at.map(|dt| dt.to_rfc3339()),
                batch.error_details,
            ],
        )?;
        Ok(updated == 1)
    }

    /// Get a batch by id.
    pub fn get(&self, id: &str) -> Result<Option<ImportBatch>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM import_batches WHERE id = ?1")?;
        super::to_option(stmt.query_row(params![id], row_to_batch))
    }

    /// Most recent batches across all counties, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<ImportBatch>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM import_batches ORDER BY started_at DESC LIMIT ?1",
        )?;
        let batches = stmt
            .query_map(params![limit as i64], row_to_batch)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    /// All batches for one county, newest first.
    pub fn list_for_county(&self, county_fips: &str) -> Result<Vec<ImportBatch>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM import_batches WHERE county_fips = ?1 ORDER BY started_at DESC",
        )?;
        let batches = stmt
            .query_map(params![county_fips], row_to_batch)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}

fn row_to_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportBatch> {
    Ok(ImportBatch {
        id: row.get("id")?,
        county_fips: row.get("county_fips")?,
        status: BatchStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(BatchStatus::Failed),
        records_processed: row.get::<_, i64>("records_processed")? as usize,
        records_succeeded: row.get::<_, i64>("records_succeeded")? as usize,
        records_failed: row.get::<_, i64>("records_failed")? as usize,
        records_skipped: row.get::<_, i64>("records_skipped")? as usize,
        started_at: parse_datetime(&row.get::<_, String>("started_at")?),
        completed_at: parse_datetime_opt(row.get::<_, Option<String>>("completed_at")?),
        error_details: row.get("error_details")?,
    })
}
