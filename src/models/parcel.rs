//! Parcel record model.
//!
//! A `ParcelRecord` is the canonical, fully-enriched form of one cadastral
//! parcel: validated geometry, derived spatial metrics, heuristic risk
//! scores, and defensively-parsed attributes. Records are keyed by
//! `(parcel_id, county_fips)`; re-importing the same parcel upserts.

use chrono::NaiveDate;
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Categorical and continuous spatial features derived for a parcel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialFeatures {
    /// Centroid falls inside Florida's coastal envelope.
    pub coastal: bool,
    /// Parcel touches a water body. Always false until a hydrography
    /// layer is wired in; kept explicit rather than guessed.
    pub waterfront: bool,
    /// Parcel is near a water body. Same hydrography gap as `waterfront`.
    pub near_water: bool,
    /// Centroid within 20 miles of a major Florida city.
    pub urban: bool,
    /// Raw FEMA flood zone designation, when the source carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood_zone: Option<String>,
    /// Flood risk derived from the zone designation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood_risk: Option<f64>,
    /// Ground elevation in feet, when the source carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_ft: Option<f64>,
    /// Elevation below 10 feet.
    pub low_elevation: bool,
}

/// Heuristic risk scores, each bounded to [0, 1].
///
/// These are deliberately simple heuristics, not calibrated models. They
/// live behind the `RiskModel` trait so a trained model can replace them
/// without touching any caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub hurricane: f64,
    pub flood: f64,
    pub wildfire: f64,
    /// Only computed for coastal parcels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storm_surge: Option<f64>,
}

impl RiskFactors {
    /// All present scores fall within [0, 1].
    pub fn in_bounds(&self) -> bool {
        let ok = |v: f64| (0.0..=1.0).contains(&v);
        ok(self.hurricane)
            && ok(self.flood)
            && ok(self.wildfire)
            && self.storm_surge.map_or(true, ok)
    }
}

/// Structure and usage attributes parsed from the source record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFeatures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roof_type: Option<String>,
    /// Years since the (effective) build year, clamped to 0..=200.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_age: Option<f64>,
    /// Perimeter / (2 * sqrt(pi * area)); 1.0 for a circle, larger for
    /// more convoluted parcel shapes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_complexity: Option<f64>,
    /// Owner name matches a corporate suffix (LLC, INC, CORP, ...).
    pub is_corporate_owner: bool,
}

/// Owner mailing address, normalized to its components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl OwnerAddress {
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.state.is_none() && self.zip.is_none()
    }
}

/// One normalized, enriched cadastral parcel.
#[derive(Debug, Clone)]
pub struct ParcelRecord {
    /// Source parcel identifier, unique within a county + batch.
    pub parcel_id: String,
    /// Five-digit county FIPS code.
    pub county_fips: String,
    /// Validated geometry, WGS84.
    pub geometry: Geometry<f64>,
    /// Geometric center of `geometry`.
    pub centroid: Point<f64>,
    /// Tolerance-simplified geometry, for rendering and WKT export only.
    /// Never used for area or perimeter math.
    pub simplified_geometry: Geometry<f64>,
    /// Axis-aligned bounding box.
    pub bbox: BBox,
    /// Area in square feet, rounded to the nearest foot.
    pub area_sqft: f64,
    /// Area in acres (sqft / 43,560), rounded to 2 decimals.
    pub area_acres: f64,
    /// Polygon ring length in feet; 0 for non-polygons.
    pub perimeter_ft: f64,
    /// Standardized situs address.
    pub address: Option<String>,
    pub owner_name: Option<String>,
    pub owner_address: OwnerAddress,
    pub property_value: Option<f64>,
    pub assessed_value: Option<f64>,
    pub year_built: Option<i32>,
    pub spatial_features: SpatialFeatures,
    pub risk_factors: RiskFactors,
    pub property_features: PropertyFeatures,
    /// Filename the record was read from.
    pub source_file: String,
    /// Ledger id of the import run that produced this record.
    pub import_batch_id: String,
    /// Vintage date of the source dataset.
    pub data_vintage: NaiveDate,
}
