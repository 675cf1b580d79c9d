//! Derived spatial features and geometry metrics.
//!
//! All classifications are deterministic functions of the centroid and the
//! raw attributes; no network lookups. Waterfront and hydrography-distance
//! flags stay false until a hydrography layer is wired in.

use geo_types::{Geometry, Point};

use crate::errors::TransformError;
use crate::geometry::{self, BBox};
use crate::models::SpatialFeatures;
use crate::sources::{attr, AttrMap};

const FLOOD_ZONE: &[&str] = &["FLOOD_ZONE", "FLD_ZONE"];
const ELEVATION: &[&str] = &["ELEVATION", "ELEV_FT", "ELEV"];

/// Envelope of Florida's coastal band. Parcels with a centroid inside it
/// are treated as coastal for risk purposes.
const COASTAL_LNG: (f64, f64) = (-87.5, -79.8);
const COASTAL_LAT: (f64, f64) = (24.5, 31.0);

/// Centroid below this elevation (feet) counts as low-lying.
const LOW_ELEVATION_FT: f64 = 10.0;

/// A parcel within this distance of a major city centre counts as urban.
const URBAN_RADIUS_MILES: f64 = 20.0;
const MILES_TO_METERS: f64 = 1_609.344;

/// Major Florida city centres, (latitude, longitude).
const MAJOR_CITIES: &[(&str, f64, f64)] = &[
    ("Jacksonville", 30.3322, -81.6557),
    ("Miami", 25.7617, -80.1918),
    ("Tampa", 27.9506, -82.4572),
    ("Orlando", 28.5384, -81.3789),
    ("St. Petersburg", 27.7676, -82.6403),
    ("Hialeah", 25.8576, -80.2781),
    ("Tallahassee", 30.4383, -84.2807),
    ("Fort Lauderdale", 26.1224, -80.1373),
    ("Port St. Lucie", 27.2730, -80.3582),
    ("Cape Coral", 26.5629, -81.9495),
];

/// Geometry-derived metrics for one parcel.
#[derive(Debug, Clone)]
pub struct GeometryMetrics {
    pub centroid: Point<f64>,
    pub bbox: BBox,
    pub area_sqft: f64,
    pub area_acres: f64,
    pub perimeter_ft: f64,
    pub simplified: Geometry<f64>,
}

/// Compute centroid, bounding box, areas, perimeter, and a simplified
/// rendering of the geometry.
///
/// Area is rounded to whole square feet and acres to two decimals, so a
/// given geometry always produces identical stored values.
pub fn compute_metrics(
    geometry: &Geometry<f64>,
    tolerance: f64,
) -> Result<GeometryMetrics, TransformError> {
    let centroid = geometry::centroid(geometry)
        .ok_or_else(|| TransformError::Feature("geometry has no centroid".to_string()))?;
    let bbox = BBox::from_geometry(geometry)
        .ok_or_else(|| TransformError::Feature("geometry has no bounding box".to_string()))?;

    let area_sqm = geometry::area_square_meters(geometry);
    let area_sqft = (area_sqm * geometry::SQM_TO_SQFT).round();
    let area_acres = (area_sqft / geometry::SQFT_PER_ACRE * 100.0).round() / 100.0;

    Ok(GeometryMetrics {
        centroid,
        bbox,
        area_sqft,
        area_acres,
        perimeter_ft: geometry::perimeter_feet(geometry),
        simplified: geometry::simplify(geometry, tolerance),
    })
}

/// Perimeter-to-area shape complexity; 1.0 is a circle, higher is more
/// irregular. None for degenerate geometry.
pub fn shape_complexity(perimeter_ft: f64, area_sqft: f64) -> Option<f64> {
    if area_sqft <= 0.0 || perimeter_ft <= 0.0 {
        return None;
    }
    Some(perimeter_ft / (2.0 * (std::f64::consts::PI * area_sqft).sqrt()))
}

/// Is this point inside the Florida coastal envelope?
pub fn is_coastal(centroid: Point<f64>) -> bool {
    let (lng, lat) = (centroid.x(), centroid.y());
    lng > COASTAL_LNG.0 && lng < COASTAL_LNG.1 && lat > COASTAL_LAT.0 && lat < COASTAL_LAT.1
}

/// Is this point within the urban radius of any major city?
pub fn is_urban(centroid: Point<f64>) -> bool {
    let radius_m = URBAN_RADIUS_MILES * MILES_TO_METERS;
    MAJOR_CITIES.iter().any(|(_, lat, lng)| {
        geometry::haversine_distance(centroid.y(), centroid.x(), *lat, *lng) <= radius_m
    })
}

/// FEMA flood-zone designation to a risk weight.
/// V zones (coastal high hazard) 0.9, A zones 0.7, X (minimal) 0.2,
/// anything else 0.3.
pub fn flood_zone_risk(zone: &str) -> f64 {
    let zone = zone.trim().to_uppercase();
    if zone.contains('V') {
        0.9
    } else if zone.contains('A') {
        0.7
    } else if zone.contains('X') {
        0.2
    } else {
        0.3
    }
}

/// Classify a parcel from its centroid and raw attributes.
pub fn classify(centroid: Point<f64>, attrs: &AttrMap) -> SpatialFeatures {
    let flood_zone = attr(attrs, FLOOD_ZONE).map(|z| z.trim().to_uppercase());
    let flood_risk = flood_zone.as_deref().map(flood_zone_risk);

    let elevation_ft = attr(attrs, ELEVATION).and_then(|v| super::normalize::parse_numeric(v));
    let low_elevation = elevation_ft.map(|e| e < LOW_ELEVATION_FT).unwrap_or(false);

    SpatialFeatures {
        coastal: is_coastal(centroid),
        waterfront: false,
        near_water: false,
        urban: is_urban(centroid),
        flood_zone,
        flood_risk,
        elevation_ft,
        low_elevation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Geometry};

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_miami_parcel_is_coastal_and_urban() {
        let centroid = Point::new(-80.19, 25.76);
        assert!(is_coastal(centroid));
        assert!(is_urban(centroid));
    }

    #[test]
    fn test_inland_rural_parcel() {
        // Deep in the Ocala National Forest area, > 20 mi from any listed city
        let centroid = Point::new(-81.72, 29.17);
        assert!(is_coastal(centroid)); // still inside the state envelope
        assert!(!is_urban(centroid));
    }

    #[test]
    fn test_out_of_state_is_not_coastal() {
        assert!(!is_coastal(Point::new(-84.39, 33.75))); // Atlanta
        assert!(!is_coastal(Point::new(-79.0, 26.0))); // Atlantic, east of envelope
    }

    #[test]
    fn test_flood_zone_weights() {
        assert_eq!(flood_zone_risk("VE"), 0.9);
        assert_eq!(flood_zone_risk("AE"), 0.7);
        assert_eq!(flood_zone_risk("A"), 0.7);
        assert_eq!(flood_zone_risk("X"), 0.2);
        assert_eq!(flood_zone_risk("D"), 0.3);
    }

    #[test]
    fn test_classify_reads_zone_and_elevation() {
        let features = classify(
            Point::new(-80.19, 25.76),
            &attrs(&[("FLOOD_ZONE", "AE"), ("ELEVATION", "6.5")]),
        );
        assert_eq!(features.flood_zone.as_deref(), Some("AE"));
        assert_eq!(features.flood_risk, Some(0.7));
        assert_eq!(features.elevation_ft, Some(6.5));
        assert!(features.low_elevation);
        assert!(!features.waterfront);
    }

    #[test]
    fn test_classify_without_zone() {
        let features = classify(Point::new(-80.19, 25.76), &attrs(&[]));
        assert_eq!(features.flood_zone, None);
        assert_eq!(features.flood_risk, None);
        assert!(!features.low_elevation);
    }

    #[test]
    fn test_metrics_rounding() {
        // Roughly 111m x 111m square near the equator-ish latitudes
        let geom: Geometry<f64> = polygon![
            (x: -80.0, y: 26.0),
            (x: -80.0, y: 26.001),
            (x: -79.999, y: 26.001),
            (x: -79.999, y: 26.0),
            (x: -80.0, y: 26.0),
        ]
        .into();
        let metrics = compute_metrics(&geom, 0.0001).unwrap();
        assert_eq!(metrics.area_sqft, metrics.area_sqft.round());
        assert!((metrics.area_acres * 100.0).fract().abs() < 1e-9);
        assert!(metrics.area_sqft > 0.0);
        assert!(metrics.perimeter_ft > 0.0);
        assert!(metrics.bbox.contains_point(metrics.centroid.x(), metrics.centroid.y()));
    }

    #[test]
    fn test_shape_complexity() {
        // A square has complexity ~1.128 (4s / 2*sqrt(pi*s^2))
        let c = shape_complexity(400.0, 10_000.0).unwrap();
        assert!((c - 1.128).abs() < 0.01);
        assert_eq!(shape_complexity(0.0, 10_000.0), None);
        assert_eq!(shape_complexity(400.0, 0.0), None);
    }
}
