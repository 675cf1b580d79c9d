//! Shapefile parcel source (.shp + .dbf attribute records).
//!
//! Geometry is assumed to already be WGS84; Florida DOR statewide extracts
//! ship that way, and reprojection is out of scope for this pipeline.
//!
//! A statewide county extract can run to a million shapes, so features are
//! never collected up front: a reader thread feeds a bounded channel and
//! the returned iterator pulls from it one feature at a time.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use geo_types::{Coord, Geometry, LineString, Point, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::Shape;
use tracing::warn;

use super::{file_name, AttrMap, FeatureIter, ParcelSource, RawFeature};
use crate::errors::SourceError;

/// Bounds how far the reader thread can run ahead of the consumer.
const CHANNEL_CAPACITY: usize = 1024;

type ShpReader = shapefile::Reader<BufReader<File>, BufReader<File>>;

pub struct ShapefileSource {
    path: PathBuf,
}

impl ShapefileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ParcelSource for ShapefileSource {
    fn format_id(&self) -> &'static str {
        "shapefile"
    }

    fn source_path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<FeatureIter, SourceError> {
        let reader: ShpReader =
            shapefile::Reader::from_path(&self.path).map_err(|e| SourceError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let source_file = file_name(&self.path);
        let path = self.path.clone();
        // The shapefile crate only offers iterators that borrow the reader,
        // so the reader moves to its own thread. Dropping the receiver
        // disconnects the channel and stops the thread mid-file.
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        std::thread::spawn(move || stream_features(reader, &tx, &source_file, &path));
        Ok(Box::new(rx.into_iter()))
    }
}

fn stream_features(
    mut reader: ShpReader,
    tx: &mpsc::SyncSender<RawFeature>,
    source_file: &str,
    path: &Path,
) {
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = match result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable shapefile record, stopping file");
                // One geometry-less feature so the drop lands in the skip
                // count rather than vanishing
                let _ = tx.send(RawFeature {
                    geometry: None,
                    attrs: AttrMap::new(),
                    source_file: source_file.to_string(),
                });
                return;
            }
        };

        let mut attrs = AttrMap::new();
        for (field, value) in record {
            if let Some(text) = field_string(value) {
                attrs.insert(field.to_uppercase(), text);
            }
        }

        let feature = RawFeature {
            geometry: shape_to_geometry(shape),
            attrs,
            source_file: source_file.to_string(),
        };
        if tx.send(feature).is_err() {
            return;
        }
    }
}

/// Stringify a dbase field; empty and unsupported field types are dropped.
fn field_string(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.filter(|s| !s.trim().is_empty()),
        FieldValue::Numeric(n) => n.map(|n| n.to_string()),
        FieldValue::Float(f) => f.map(|f| f.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(d.to_string()),
        FieldValue::Currency(c) => Some(c.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        FieldValue::Memo(m) => Some(m),
        _ => None,
    }
}

/// Convert a shape to geometry. Only points and polygons carry parcel
/// semantics here; other shape types yield no geometry and the record is
/// dropped (counted skipped) downstream.
fn shape_to_geometry(shape: Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointM(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointZ(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::Polygon(p) => Some(polygon_to_geometry(&p)),
        _ => None,
    }
}

/// Group shapefile rings into polygons with holes.
///
/// Shapefiles store exterior rings clockwise and holes counter-clockwise,
/// with each exterior followed by its holes; the signed area of each ring
/// recovers the orientation.
fn polygon_to_geometry(polygon: &shapefile::Polygon) -> Geometry<f64> {
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
    }

    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut rings: Vec<(LineString<f64>, bool)> = Vec::with_capacity(polygon.rings().len());
    for ring in polygon.rings() {
        let mut coords: Vec<Coord<f64>> = ring
            .points()
            .iter()
            .map(|pt| Coord { x: pt.x, y: pt.y })
            .collect();
        ensure_closed(&mut coords);
        let ls = LineString(coords);
        // CW (negative signed area) marks an exterior ring in shapefiles
        let is_exterior = signed_area(&ls.0) < 0.0;
        rings.push((ls, is_exterior));
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for (ls, is_exterior) in rings {
        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    if polys.len() == 1 {
        Geometry::Polygon(polys.remove(0))
    } else {
        Geometry::MultiPolygon(geo_types::MultiPolygon(polys))
    }
}
