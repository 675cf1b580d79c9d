//! CSV parcel source.
//!
//! Geometry is detected from a `WKT`/`GEOMETRY` column, or from
//! `LATITUDE`/`LONGITUDE` columns. Rows with neither, and rows the csv
//! parser rejects outright, flow through with no geometry and are counted
//! as skipped by the validator downstream.

use std::path::{Path, PathBuf};

use geo_types::{Geometry, Point};
use tracing::warn;

use super::{file_name, AttrMap, FeatureIter, ParcelSource, RawFeature};
use crate::errors::SourceError;
use crate::geometry::parse_wkt;

const WKT_COLUMNS: [&str; 2] = ["WKT", "GEOMETRY"];

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ParcelSource for CsvSource {
    fn format_id(&self) -> &'static str {
        "csv"
    }

    fn source_path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<FeatureIter, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| SourceError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| SourceError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim().to_uppercase())
            .collect();

        let source_file = file_name(&self.path);
        let path = self.path.clone();

        let iter = reader.into_records().map(move |result| {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed CSV row");
                    // Surfaces as one skipped record instead of vanishing
                    return RawFeature {
                        geometry: None,
                        attrs: AttrMap::new(),
                        source_file: source_file.clone(),
                    };
                }
            };

            let mut attrs = AttrMap::new();
            for (header, value) in headers.iter().zip(record.iter()) {
                if !value.is_empty() {
                    attrs.insert(header.clone(), value.to_string());
                }
            }

            let geometry = row_geometry(&attrs);
            RawFeature {
                geometry,
                attrs,
                source_file: source_file.clone(),
            }
        });

        Ok(Box::new(iter))
    }
}

/// Extract geometry from a CSV row: WKT column first, lat/lng fallback.
fn row_geometry(attrs: &AttrMap) -> Option<Geometry<f64>> {
    for column in WKT_COLUMNS {
        if let Some(text) = attrs.get(column) {
            // Supabase exports prefix an SRID; strip it before parsing.
            let text = text.rsplit_once(';').map(|(_, wkt)| wkt).unwrap_or(text);
            match parse_wkt(text) {
                Ok(geom) => return Some(geom),
                Err(reason) => {
                    warn!(column, reason, "unparseable WKT in CSV row");
                    return None;
                }
            }
        }
    }

    let lat = attrs.get("LATITUDE").and_then(|v| v.parse::<f64>().ok())?;
    let lng = attrs.get("LONGITUDE").and_then(|v| v.parse::<f64>().ok())?;
    Some(Geometry::Point(Point::new(lng, lat)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(contents: &str) -> Vec<RawFeature> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.csv");
        std::fs::write(&path, contents).unwrap();
        CsvSource::new(path).read().unwrap().collect()
    }

    #[test]
    fn test_wkt_column() {
        let features = read_all(
            "PARCEL_ID,WKT\n\
             402101,\"POLYGON((0 0,0 1,1 1,1 0,0 0))\"\n",
        );
        assert_eq!(features.len(), 1);
        assert!(matches!(
            features[0].geometry,
            Some(Geometry::Polygon(_))
        ));
        assert_eq!(features[0].attrs.get("PARCEL_ID").unwrap(), "402101");
    }

    #[test]
    fn test_srid_prefix_stripped() {
        let features = read_all(
            "PARCEL_ID,GEOMETRY\n\
             1,\"SRID=4326;POINT(-80.5 25.5)\"\n",
        );
        assert!(matches!(features[0].geometry, Some(Geometry::Point(_))));
    }

    #[test]
    fn test_lat_lng_columns() {
        let features = read_all(
            "parcel_id,latitude,longitude\n\
             7,26.1,-81.7\n",
        );
        let geom = features[0].geometry.as_ref().unwrap();
        match geom {
            Geometry::Point(p) => {
                assert!((p.x() + 81.7).abs() < 1e-9);
                assert!((p.y() - 26.1).abs() < 1e-9);
            }
            _ => panic!("expected point"),
        }
        // Lowercase headers are uppercased on ingest
        assert!(features[0].attrs.contains_key("PARCEL_ID"));
    }

    #[test]
    fn test_row_without_geometry_columns() {
        let features = read_all("PARCEL_ID,OWNER\n9,SMITH\n");
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_none());
    }

    #[test]
    fn test_malformed_row_surfaces_as_skippable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.csv");
        // Row 2 is not valid UTF-8 and fails the csv parser
        std::fs::write(&path, b"PARCEL_ID,OWNER\n1,SMITH\n2,\xff\xfe\n3,JONES\n").unwrap();

        let features: Vec<_> = CsvSource::new(path).read().unwrap().collect();
        assert_eq!(features.len(), 3);
        assert!(features[1].geometry.is_none());
        assert!(features[1].attrs.is_empty());
        // Later rows are unaffected
        assert_eq!(features[2].attrs.get("PARCEL_ID").unwrap(), "3");
    }

    #[test]
    fn test_bad_wkt_yields_no_geometry() {
        let features = read_all("PARCEL_ID,WKT\n1,POLYGON((broken\n");
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_none());
    }
}
