//! Geometry validation, measurement, and simplification.
//!
//! All geometry is WGS84 (EPSG:4326). Areas and perimeters are computed on
//! the full-resolution geometry; the simplified geometry exists only for
//! rendering and WKT export. WKT text is the storage form for geometry
//! columns, so parse/print helpers live here too.

use geo::{BoundingRect, Centroid, Simplify};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};
use wkt::ToWkt;

/// Square meters to square feet.
pub const SQM_TO_SQFT: f64 = 10.7639;

/// Square feet per acre.
pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// Meters to feet.
pub const METERS_TO_FEET: f64 = 3.28084;

/// Meters per degree of latitude (WGS84 mean).
const METERS_PER_DEG_LAT: f64 = 110_574.0;

/// Meters per degree of longitude at the equator; scale by cos(lat).
const METERS_PER_DEG_LON: f64 = 111_320.0;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BBox {
    /// Compute from a geometry. None for empty geometries.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        let rect = geom.bounding_rect()?;
        Some(Self {
            north: rect.max().y,
            south: rect.min().y,
            east: rect.max().x,
            west: rect.min().x,
        })
    }

    pub fn contains_point(&self, lng: f64, lat: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }
}

/// Structural validity check, permissive by default.
///
/// Polygons need a closed-ring-sized exterior (>= 4 positions) on every
/// member polygon; points are always structurally complete once parsed;
/// every other declared type passes through unchecked. Invalid geometry
/// causes the owning record to be dropped and counted, never an error.
pub fn validate(geom: &Geometry<f64>) -> bool {
    match geom {
        Geometry::Polygon(poly) => poly.exterior().0.len() >= 4,
        Geometry::MultiPolygon(mp) => {
            !mp.0.is_empty() && mp.0.iter().all(|poly| poly.exterior().0.len() >= 4)
        }
        Geometry::Point(_) => true,
        _ => true,
    }
}

/// Geometric center. None only for empty collections.
pub fn centroid(geom: &Geometry<f64>) -> Option<Point<f64>> {
    geom.centroid()
}

/// Haversine great-circle distance between two lat/lng points, in meters.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Planar area in square meters, scaling squared degrees by the local
/// meters-per-degree at the geometry's centroid latitude. Accurate to well
/// under a percent at parcel scale, which is all the risk heuristics need.
pub fn area_square_meters(geom: &Geometry<f64>) -> f64 {
    use geo::Area;

    let area_deg2 = geom.unsigned_area();
    if area_deg2 == 0.0 {
        return 0.0;
    }
    let lat = geom.centroid().map(|c| c.y()).unwrap_or(0.0);
    area_deg2 * METERS_PER_DEG_LAT * (METERS_PER_DEG_LON * lat.to_radians().cos())
}

/// Total ring length (exterior + holes) of polygonal geometry, in feet.
/// Zero for anything that is not a polygon.
pub fn perimeter_feet(geom: &Geometry<f64>) -> f64 {
    fn ring_meters(ring: &geo_types::LineString<f64>) -> f64 {
        ring.0
            .windows(2)
            .map(|w| haversine_distance(w[0].y, w[0].x, w[1].y, w[1].x))
            .sum()
    }

    fn polygon_meters(poly: &geo_types::Polygon<f64>) -> f64 {
        ring_meters(poly.exterior()) + poly.interiors().iter().map(ring_meters).sum::<f64>()
    }

    let meters = match geom {
        Geometry::Polygon(poly) => polygon_meters(poly),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_meters).sum(),
        _ => 0.0,
    };
    meters * METERS_TO_FEET
}

/// Douglas-Peucker simplification for polygonal geometry. Non-polygonal
/// geometry is returned unchanged.
pub fn simplify(geom: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geom {
        Geometry::Polygon(poly) => Geometry::Polygon(poly.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        other => other.clone(),
    }
}

/// Parse a WKT string to a geometry.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>, String> {
    use std::str::FromStr;
    wkt::Wkt::from_str(text)
        .map_err(|e| format!("{:?}", e))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| format!("{:?}", e))
        })
}

/// Serialize a geometry to WKT text.
pub fn to_wkt(geom: &Geometry<f64>) -> String {
    geom.wkt_string()
}
