//! Staging-to-production promotion.
//!
//! Readers always see either the old production table or the new one, never
//! a mix: the whole promotion runs inside one immediate transaction, and
//! SQLite table renames are metadata-only, so the cutover is atomic and
//! O(1) regardless of row counts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

use crate::errors::SwapError;
use crate::repository::{self, parcel, ParcelTable};

const BACKUP_TABLE: &str = "parcels_backup";

/// Outcome of one promotion.
#[derive(Debug, Clone)]
pub struct SwapResult {
    /// Production row count before the swap.
    pub old_count: i64,
    /// Production row count after the swap.
    pub new_count: i64,
    pub swapped_at: DateTime<Utc>,
}

/// The table-cutover mechanism, separated from the coordination policy so
/// tests can exercise policy against a recording stand-in.
pub trait SwapProtocol: Send + Sync {
    /// Atomically replace production with staging and leave behind a fresh
    /// empty staging table.
    fn execute(&self, conn: &mut Connection) -> Result<(), SwapError>;
}

/// Rename-based swap: production is renamed aside, staging takes its name,
/// and the backup is dropped before the transaction commits.
#[derive(Debug, Default)]
pub struct SqliteRenameSwap;

impl SwapProtocol for SqliteRenameSwap {
    fn execute(&self, conn: &mut Connection) -> Result<(), SwapError> {
        let production = ParcelTable::Production.table_name();
        let staging = ParcelTable::Staging.table_name();

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Indexes follow their table through a rename but keep their names,
        // so they are dropped up front and recreated on the new tables.
        tx.execute_batch(&format!(
            r#"
            DROP INDEX IF EXISTS idx_{production}_county;
            DROP INDEX IF EXISTS idx_{production}_batch;
            DROP INDEX IF EXISTS idx_{staging}_county;
            DROP INDEX IF EXISTS idx_{staging}_batch;
            ALTER TABLE {production} RENAME TO {BACKUP_TABLE};
            ALTER TABLE {staging} RENAME TO {production};
            "#
        ))?;
        tx.execute_batch(&parcel::create_table_sql(staging))?;
        tx.execute_batch(&parcel::create_table_sql(production))?;
        tx.execute_batch(&format!("DROP TABLE {BACKUP_TABLE};"))?;
        tx.commit()?;
        Ok(())
    }
}

/// Serializes promotions and enforces the safety preconditions.
pub struct SwapCoordinator {
    db_path: PathBuf,
    protocol: Box<dyn SwapProtocol>,
    lock: tokio::sync::Mutex<()>,
}

impl SwapCoordinator {
    pub fn new(db_path: &Path) -> Self {
        Self::with_protocol(db_path, Box::new(SqliteRenameSwap))
    }

    pub fn with_protocol(db_path: &Path, protocol: Box<dyn SwapProtocol>) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            protocol,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Promote staging to production.
    ///
    /// Refused when staging is empty or holds fewer than `min_fraction` of
    /// the current production rows; a partial import must never silently
    /// shrink the dataset. Concurrent calls are serialized, so the loser of
    /// the race sees the fresh empty staging table and is refused.
    pub async fn promote_staging(&self, min_fraction: f64) -> Result<SwapResult, SwapError> {
        let _guard = self.lock.lock().await;

        let mut conn = repository::connect(&self.db_path)?;
        let staging_count = count_rows(&conn, ParcelTable::Staging.table_name())?;
        let production_count = count_rows(&conn, ParcelTable::Production.table_name())?;

        let floor = (production_count as f64 * min_fraction).ceil() as i64;
        if staging_count == 0 || staging_count < floor {
            warn!(
                staging = staging_count,
                production = production_count,
                min_fraction,
                "refusing table swap"
            );
            return Err(SwapError::Precondition {
                staging: staging_count as u64,
                production: production_count as u64,
                min_fraction,
            });
        }

        self.protocol.execute(&mut conn)?;
        let result = SwapResult {
            old_count: production_count,
            new_count: staging_count,
            swapped_at: Utc::now(),
        };
        info!(
            old_count = result.old_count,
            new_count = result.new_count,
            "promoted staging to production"
        );
        Ok(result)
    }
}

fn count_rows(conn: &Connection, table: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
}
