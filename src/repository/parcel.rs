//! Parcel repository: production and staging tables.
//!
//! Both tables share one layout; imports write to staging and the swap
//! protocol promotes staging to production by table rename. The upsert is
//! keyed on (parcel_id, county_fips) so re-running an import converges to
//! one row per parcel.

use std::path::{Path, PathBuf};

use chrono::Utc;
use geo_types::Point;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::{parse_date, Result};
use crate::geometry::{self, BBox};
use crate::models::ParcelRecord;

/// Which parcel table a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParcelTable {
    Production,
    Staging,
}

impl ParcelTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Production => "parcels",
            Self::Staging => "parcels_staging",
        }
    }
}

/// DDL for a parcel table under the given name. The swap protocol uses
/// this to recreate an empty staging table after promotion.
pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            parcel_id TEXT NOT NULL,
            county_fips TEXT NOT NULL,
            geometry_wkt TEXT NOT NULL,
            simplified_wkt TEXT NOT NULL,
            centroid_lng REAL NOT NULL,
            centroid_lat REAL NOT NULL,
            bbox_north REAL NOT NULL,
            bbox_south REAL NOT NULL,
            bbox_east REAL NOT NULL,
            bbox_west REAL NOT NULL,
            area_sqft REAL NOT NULL,
            area_acres REAL NOT NULL,
            perimeter_ft REAL NOT NULL,
            address TEXT,
            owner_name TEXT,
            owner_address TEXT NOT NULL,
            property_value REAL,
            assessed_value REAL,
            year_built INTEGER,
            spatial_features TEXT NOT NULL,
            risk_factors TEXT NOT NULL,
            property_features TEXT NOT NULL,
            source_file TEXT NOT NULL,
            import_batch_id TEXT NOT NULL,
            data_vintage TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (parcel_id, county_fips)
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_county ON {table}(county_fips);
        CREATE INDEX IF NOT EXISTS idx_{table}_batch ON {table}(import_batch_id);
        "#
    )
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// SQLite-backed parcel repository.
pub struct ParcelRepository {
    db_path: PathBuf,
}

impl ParcelRepository {
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
        conn.execute_batch(&create_table_sql(ParcelTable::Production.table_name()))?;
        conn.execute_batch(&create_table_sql(ParcelTable::Staging.table_name()))?;
        Ok(())
    }

    /// Upsert one batch of records in a single transaction. Either every
    /// record in the slice lands or none does.
    pub fn upsert_batch(&self, table: ParcelTable, records: &[ParcelRecord]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT INTO {table} (
                    parcel_id, county_fips, geometry_wkt, simplified_wkt,
                    centroid_lng, centroid_lat,
                    bbox_north, bbox_south, bbox_east, bbox_west,
                    area_sqft, area_acres, perimeter_ft,
                    address, owner_name, owner_address,
                    property_value, assessed_value, year_built,
                    spatial_features, risk_factors, property_features,
                    source_file, import_batch_id, data_vintage, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
                )
                ON CONFLICT(parcel_id, county_fips) DO UPDATE SET
                    geometry_wkt = excluded.geometry_wkt,
                    simplified_wkt = excluded.simplified_wkt,
                    centroid_lng = excluded.centroid_lng,
                    centroid_lat = excluded.centroid_lat,
                    bbox_north = excluded.bbox_north,
                    bbox_south = excluded.bbox_south,
                    bbox_east = excluded.bbox_east,
                    bbox_west = excluded.bbox_west,
                    area_sqft = excluded.area_sqft,
                    area_acres = excluded.area_acres,
                    perimeter_ft = excluded.perimeter_ft,
                    address = excluded.address,
                    owner_name = excluded.owner_name,
                    owner_address = excluded.owner_address,
                    property_value = excluded.property_value,
                    assessed_value = excluded.assessed_value,
                    year_built = excluded.year_built,
                    spatial_features = excluded.spatial_features,
                    risk_factors = excluded.risk_factors,
                    property_features = excluded.property_features,
                    source_file = excluded.source_file,
                    import_batch_id = excluded.import_batch_id,
                    data_vintage = excluded.data_vintage,
                    updated_at = excluded.updated_at
                "#,
                table = table.table_name(),
            ))?;

            let updated_at = Utc::now().to_rfc3339();
            for record in records {
                stmt.execute(params![
                    record.parcel_id,
                    record.county_fips,
                    geometry::to_wkt(&record.geometry),
                    geometry::to_wkt(&record.simplified_geometry),
                    record.centroid.x(),
                    record.centroid.y(),
                    record.bbox.north,
                    record.bbox.south,
                    record.bbox.east,
                    record.bbox.west,
                    record.area_sqft,
                    record.area_acres,
                    record.perimeter_ft,
                    record.address,
                    record.owner_name,
                    to_json(&record.owner_address)?,
                    record.property_value,
                    record.assessed_value,
                    record.year_built,
                    to_json(&record.spatial_features)?,
                    to_json(&record.risk_factors)?,
                    to_json(&record.property_features)?,
                    record.source_file,
                    record.import_batch_id,
                    record.data_vintage.format("%Y-%m-%d").to_string(),
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Get one parcel by its composite key.
    pub fn get(
        &self,
        table: ParcelTable,
        parcel_id: &str,
        county_fips: &str,
    ) -> Result<Option<ParcelRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE parcel_id = ?1 AND county_fips = ?2",
            table.table_name()
        ))?;
        super::to_option(stmt.query_row(params![parcel_id, county_fips], row_to_record))
    }

    /// Total row count for a table.
    pub fn count(&self, table: ParcelTable) -> Result<i64> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table_name()),
            [],
            |row| row.get(0),
        )
    }

    /// Row count for one county.
    pub fn count_county(&self, table: ParcelTable, county_fips: &str) -> Result<i64> {
        let conn = self.connect()?;
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE county_fips = ?1",
                table.table_name()
            ),
            params![county_fips],
            |row| row.get(0),
        )
    }

    /// Per-county row counts, descending.
    pub fn county_counts(&self, table: ParcelTable) -> Result<Vec<(String, i64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT county_fips, COUNT(*) FROM {} GROUP BY county_fips ORDER BY COUNT(*) DESC",
            table.table_name()
        ))?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Remove one county's rows, used to reset staging before a re-import.
    pub fn delete_county(&self, table: ParcelTable, county_fips: &str) -> Result<usize> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE county_fips = ?1",
                table.table_name()
            ),
            params![county_fips],
        )
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParcelRecord> {
    let wkt_error = |reason: String| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            reason.into(),
        )
    };
    let geometry = geometry::parse_wkt(&row.get::<_, String>("geometry_wkt")?)
        .map_err(|e| wkt_error(e))?;
    let simplified_geometry = geometry::parse_wkt(&row.get::<_, String>("simplified_wkt")?)
        .map_err(|e| wkt_error(e))?;

    Ok(ParcelRecord {
        parcel_id: row.get("parcel_id")?,
        county_fips: row.get("county_fips")?,
        geometry,
        centroid: Point::new(row.get("centroid_lng")?, row.get("centroid_lat")?),
        simplified_geometry,
        bbox: BBox {
            north: row.get("bbox_north")?,
            south: row.get("bbox_south")?,
            east: row.get("bbox_east")?,
            west: row.get("bbox_west")?,
        },
        area_sqft: row.get("area_sqft")?,
        area_acres: row.get("area_acres")?,
        perimeter_ft: row.get("perimeter_ft")?,
        address: row.get("address")?,
        owner_name: row.get("owner_name")?,
        owner_address: serde_json::from_str(&row.get::<_, String>("owner_address")?)
            .unwrap_or_default(),
        property_value: row.get("property_value")?,
        assessed_value: row.get("assessed_value")?,
        year_built: row.get("year_built")?,
        spatial_features: serde_json::from_str(&row.get::<_, String>("spatial_features")?)
            .unwrap_or_default(),
        risk_factors: serde_json::from_str(&row.get::<_, String>("risk_factors")?)
            .unwrap_or_default(),
        property_features: serde_json::from_str(&row.get::<_, String>("property_features")?)
            .unwrap_or_default(),
        source_file: row.get("source_file")?,
        import_batch_id: row.get("import_batch_id")?,
        data_vintage: parse_date(&row.get::<_, String>("data_vintage")?),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{OwnerAddress, PropertyFeatures, RiskFactors, SpatialFeatures};
    use chrono::NaiveDate;
    use geo_types::{polygon, Geometry};

    pub(crate) fn sample_record(parcel_id: &str, county_fips: &str) -> ParcelRecord {
        let geometry: Geometry<f64> = polygon![
            (x: -80.192, y: 25.761),
            (x: -80.192, y: 25.762),
            (x: -80.191, y: 25.762),
            (x: -80.191, y: 25.761),
            (x: -80.192, y: 25.761),
        ]
        .into();
        ParcelRecord {
            parcel_id: parcel_id.to_string(),
            county_fips: county_fips.to_string(),
            centroid: Point::new(-80.1915, 25.7615),
            simplified_geometry: geometry.clone(),
            bbox: BBox {
                north: 25.762,
                south: 25.761,
                east: -80.191,
                west: -80.192,
            },
            geometry,
            area_sqft: 108_000.0,
            area_acres: 2.48,
            perimeter_ft: 1_320.0,
            address: Some("123 BRICKELL AVE MIAMI FL 33131".to_string()),
            owner_name: Some("BISCAYNE HOLDINGS LLC".to_string()),
            owner_address: OwnerAddress::default(),
            property_value: Some(850_000.0),
            assessed_value: Some(790_000.0),
            year_built: Some(1998),
            spatial_features: SpatialFeatures {
                coastal: true,
                ..Default::default()
            },
            risk_factors: RiskFactors {
                hurricane: 0.9,
                flood: 1.0,
                wildfire: 0.05,
                storm_surge: Some(0.9),
            },
            property_features: PropertyFeatures {
                is_corporate_owner: true,
                ..Default::default()
            },
            source_file: "miami.csv".to_string(),
            import_batch_id: "batch-1".to_string(),
            data_vintage: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_record;
    use super::*;
    use geo_types::Geometry;

    fn repo() -> (tempfile::TempDir, ParcelRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = ParcelRepository::new(&dir.path().join("parcels.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let (_dir, repo) = repo();
        let record = sample_record("01-3137-001", "12086");
        repo.upsert_batch(ParcelTable::Staging, &[record.clone()])
            .unwrap();

        let loaded = repo
            .get(ParcelTable::Staging, "01-3137-001", "12086")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.parcel_id, record.parcel_id);
        assert_eq!(loaded.area_acres, record.area_acres);
        assert_eq!(loaded.risk_factors, record.risk_factors);
        assert!(loaded.spatial_features.coastal);
        assert_eq!(loaded.data_vintage, record.data_vintage);
        assert!(matches!(loaded.geometry, Geometry::Polygon(_)));

        // Not visible in production until the swap
        assert!(repo
            .get(ParcelTable::Production, "01-3137-001", "12086")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_upsert_converges_to_one_row() {
        let (_dir, repo) = repo();
        let mut record = sample_record("A-1", "12015");
        repo.upsert_batch(ParcelTable::Staging, &[record.clone()])
            .unwrap();

        record.property_value = Some(900_000.0);
        record.import_batch_id = "batch-2".to_string();
        repo.upsert_batch(ParcelTable::Staging, &[record]).unwrap();

        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 1);
        let loaded = repo
            .get(ParcelTable::Staging, "A-1", "12015")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.property_value, Some(900_000.0));
        assert_eq!(loaded.import_batch_id, "batch-2");
    }

    #[test]
    fn test_same_parcel_id_in_two_counties() {
        let (_dir, repo) = repo();
        repo.upsert_batch(
            ParcelTable::Staging,
            &[sample_record("100", "12086"), sample_record("100", "12015")],
        )
        .unwrap();
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 2);
        assert_eq!(
            repo.count_county(ParcelTable::Staging, "12086").unwrap(),
            1
        );
    }

    #[test]
    fn test_delete_county_and_counts() {
        let (_dir, repo) = repo();
        repo.upsert_batch(
            ParcelTable::Staging,
            &[
                sample_record("1", "12086"),
                sample_record("2", "12086"),
                sample_record("3", "12015"),
            ],
        )
        .unwrap();

        let counts = repo.county_counts(ParcelTable::Staging).unwrap();
        assert_eq!(counts[0], ("12086".to_string(), 2));

        assert_eq!(
            repo.delete_county(ParcelTable::Staging, "12086").unwrap(),
            2
        );
        assert_eq!(repo.count(ParcelTable::Staging).unwrap(), 1);
    }
}
