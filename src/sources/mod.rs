//! Source readers for county parcel data.
//!
//! A source is a directory of files in one of three formats: a shapefile
//! set (.shp/.dbf/.shx), CSV with WKT or lat/lng columns, or a GeoJSON
//! FeatureCollection. Each reader yields raw (geometry, attribute-map)
//! pairs; attribute keys are uppercased on ingest so downstream synonym
//! lookups are case-insensitive by construction.

mod csv_source;
mod geojson_source;
mod shapefile_source;

pub use csv_source::CsvSource;
pub use geojson_source::GeoJsonSource;
pub use shapefile_source::ShapefileSource;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use geo_types::Geometry;

use crate::errors::SourceError;

/// Attribute map with uppercased keys.
pub type AttrMap = HashMap<String, String>;

/// Look up the first attribute present under any of the given names.
pub fn attr<'a>(attrs: &'a AttrMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| attrs.get(*name))
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// One raw feature read from a source file.
///
/// Geometry is None when the file row carried none (e.g. a CSV row without
/// WKT or lat/lng columns); the validator drops and counts such records.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub geometry: Option<Geometry<f64>>,
    pub attrs: AttrMap,
    pub source_file: String,
}

/// A lazy, finite, non-restartable sequence of raw features.
pub type FeatureIter = Box<dyn Iterator<Item = RawFeature> + Send>;

/// A single source file that can be read once.
pub trait ParcelSource: Send + Sync {
    /// Unique identifier for this source format.
    fn format_id(&self) -> &'static str;

    /// Path to the file being read.
    fn source_path(&self) -> &Path;

    /// Open the file and stream its features. Fails with
    /// `SourceError::Parse` when the file itself is malformed.
    fn read(&self) -> Result<FeatureIter, SourceError>;
}

/// Declared source format of a county directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Shapefile,
    Csv,
    GeoJson,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shapefile => "shapefile",
            Self::Csv => "csv",
            Self::GeoJson => "geojson",
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match (self, ext.as_deref()) {
            (Self::Shapefile, Some("shp")) => true,
            (Self::Csv, Some("csv")) => true,
            (Self::GeoJson, Some("geojson" | "json")) => true,
            _ => false,
        }
    }

    /// Detect the format of a directory from its file extensions.
    /// Shapefiles win over GeoJSON over CSV when a directory mixes formats.
    pub fn detect(dir: &Path) -> Result<Self, SourceError> {
        let files = list_files(dir)?;
        for kind in [Self::Shapefile, Self::GeoJson, Self::Csv] {
            if files.iter().any(|f| kind.matches(f)) {
                return Ok(kind);
            }
        }
        Err(SourceError::UnrecognizedFormat(dir.to_path_buf()))
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Open every file of the given kind in a directory, one source per file.
///
/// Fails with `SourceError::UnrecognizedFormat` when no matching file
/// exists. Per-file parse failures surface later, from each source's
/// `read()`, so one bad file never aborts its siblings.
pub fn open_dir(dir: &Path, kind: SourceKind) -> Result<Vec<Box<dyn ParcelSource>>, SourceError> {
    let files = list_files(dir)?;
    let sources: Vec<Box<dyn ParcelSource>> = files
        .into_iter()
        .filter(|path| kind.matches(path))
        .map(|path| -> Box<dyn ParcelSource> {
            match kind {
                SourceKind::Shapefile => Box::new(ShapefileSource::new(path)),
                SourceKind::Csv => Box::new(CsvSource::new(path)),
                SourceKind::GeoJson => Box::new(GeoJsonSource::new(path)),
            }
        })
        .collect();

    if sources.is_empty() {
        return Err(SourceError::UnrecognizedFormat(dir.to_path_buf()));
    }
    Ok(sources)
}

/// File name (not path) for provenance columns.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
