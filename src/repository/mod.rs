//! Repository layer for SQLite persistence.
//!
//! All access goes through rusqlite with short-lived connections; each
//! repository owns the path and opens a connection per call. Datetimes are
//! stored as RFC 3339 text, dates as ISO 8601, and structured sub-records
//! (owner address, spatial features, risk factors) as JSON columns.

pub mod county;
pub mod ledger;
pub mod parcel;

pub use county::CountyRepository;
pub use ledger::ImportBatchRepository;
pub use parcel::{ParcelRepository, ParcelTable};

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

pub type Result<T> = std::result::Result<T, rusqlite::Error>;

/// Open a connection with the pragmas every caller needs: WAL so readers
/// never block the loader, and a busy timeout so concurrent county workers
/// queue instead of failing.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(30))?;
    Ok(conn)
}

/// Map a no-rows result to None.
pub fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Parse an ISO 8601 date column, defaulting to the epoch date on error.
pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}
