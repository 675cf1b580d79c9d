//! GeoJSON FeatureCollection parcel source.

use std::path::{Path, PathBuf};

use geo_types::Geometry;
use geojson::GeoJson;
use tracing::warn;

use super::{file_name, AttrMap, FeatureIter, ParcelSource, RawFeature};
use crate::errors::SourceError;

pub struct GeoJsonSource {
    path: PathBuf,
}

impl GeoJsonSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn parse_error(&self, reason: impl ToString) -> SourceError {
        SourceError::Parse {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ParcelSource for GeoJsonSource {
    fn format_id(&self) -> &'static str {
        "geojson"
    }

    fn source_path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<FeatureIter, SourceError> {
        let contents = std::fs::read_to_string(&self.path)?;
        let geojson: GeoJson = contents
            .parse()
            .map_err(|e: geojson::Error| self.parse_error(e))?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(self.parse_error("expected a FeatureCollection")),
        };

        let source_file = file_name(&self.path);
        let iter = collection.features.into_iter().map(move |feature| {
            let geometry = feature.geometry.and_then(|g| {
                match Geometry::<f64>::try_from(g.value) {
                    Ok(geom) => Some(geom),
                    Err(e) => {
                        warn!(error = %e, "unsupported GeoJSON geometry, dropping");
                        None
                    }
                }
            });

            let mut attrs = AttrMap::new();
            if let Some(properties) = feature.properties {
                for (key, value) in properties {
                    if let Some(text) = property_string(&value) {
                        attrs.insert(key.to_uppercase(), text);
                    }
                }
            }

            RawFeature {
                geometry,
                attrs,
                source_file: source_file.clone(),
            }
        });

        Ok(Box::new(iter))
    }
}

/// Stringify a GeoJSON property scalar; nulls and containers are dropped.
fn property_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
