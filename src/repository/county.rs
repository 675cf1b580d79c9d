//! County queue repository.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{parse_datetime_opt, Result};
use crate::models::CountyQueueEntry;

/// SQLite-backed county scheduling queue.
pub struct CountyRepository {
    db_path: PathBuf,
}

impl CountyRepository {
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
            CREATE TABLE IF NOT EXISTS county_queue (
                fips_code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                processing_priority INTEGER NOT NULL DEFAULT 0,
                last_processed_at TEXT
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert or update a county's queue entry.
    pub fn save(&self, entry: &CountyQueueEntry) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO county_queue (fips_code, name, processing_priority, last_processed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(fips_code) DO UPDATE SET
                name = excluded.name,
                processing_priority = excluded.processing_priority,
                last_processed_at = excluded.last_processed_at
            "#,
            params![
                entry.fips_code,
                entry.name,
                entry.processing_priority,
                entry.last_processed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get one county by FIPS code.
    pub fn get(&self, fips_code: &str) -> Result<Option<CountyQueueEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM county_queue WHERE fips_code = ?1")?;
        super::to_option(stmt.query_row(params![fips_code], row_to_entry))
    }

    /// All counties in processing order: lowest priority number first,
    /// FIPS code as the tie-break so the order is stable.
    pub fn list(&self) -> Result<Vec<CountyQueueEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM county_queue ORDER BY processing_priority ASC, fips_code ASC",
        )?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove a county from the queue.
    pub fn delete(&self, fips_code: &str) -> Result<bool> {
        let conn = self.connect()?;
        let deleted = conn.execute(
            "DELETE FROM county_queue WHERE fips_code = ?1",
            params![fips_code],
        )?;
        Ok(deleted == 1)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CountyQueueEntry> {
    Ok(CountyQueueEntry {
        fips_code: row.get("fips_code")?,
        name: row.get("name")?,
        processing_priority: row.get("processing_priority")?,
        last_processed_at: parse_datetime_opt(row.get::<_, Option<String>>("last_processed_at")?),
    })
}
