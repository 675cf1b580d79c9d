//! Per-record transformation: raw feature in, storable parcel record out.
//!
//! The stages run in a fixed order per record: geometry metrics, spatial
//! classification, risk scoring, then attribute normalization. A failure in
//! any stage fails that record only; the caller decides when too many
//! failures abort the county run.

pub mod features;
pub mod normalize;
pub mod risk;

pub use features::{compute_metrics, GeometryMetrics};
pub use normalize::{NormalizedAttrs, Normalizer};
pub use risk::{HeuristicRiskModel, RiskModel};

use chrono::{Datelike, NaiveDate};
use geo_types::Geometry;

use crate::errors::TransformError;
use crate::models::ParcelRecord;
use crate::sources::RawFeature;

/// Per-run context shared by every record of a county import.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub county_fips: String,
    pub import_batch_id: String,
    pub data_vintage: NaiveDate,
    pub simplification_tolerance: f64,
}

/// Turns validated raw features into parcel records.
pub struct Transformer {
    normalizer: Normalizer,
    risk_model: Box<dyn RiskModel>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::with_risk_model(Box::new(HeuristicRiskModel))
    }

    pub fn with_risk_model(risk_model: Box<dyn RiskModel>) -> Self {
        Self {
            normalizer: Normalizer::new(),
            risk_model,
        }
    }

    /// Does this feature carry a parcel identifier under any known synonym?
    pub fn has_parcel_id(&self, raw: &RawFeature) -> bool {
        self.normalizer.parcel_id(&raw.attrs).is_some()
    }

    /// Transform one raw feature with already-validated geometry.
    pub fn transform(
        &self,
        raw: &RawFeature,
        geometry: Geometry<f64>,
        ctx: &TransformContext,
    ) -> Result<ParcelRecord, TransformError> {
        let parcel_id = self
            .normalizer
            .parcel_id(&raw.attrs)
            .ok_or(TransformError::MissingParcelId)?;

        let metrics = features::compute_metrics(&geometry, ctx.simplification_tolerance)?;
        let spatial = features::classify(metrics.centroid, &raw.attrs);
        let risks = self
            .risk_model
            .score(&spatial, metrics.centroid.y(), metrics.centroid.x());

        let mut normalized = self
            .normalizer
            .normalize(&raw.attrs, ctx.data_vintage.year());
        normalized.property_features.shape_complexity =
            features::shape_complexity(metrics.perimeter_ft, metrics.area_sqft);

        Ok(ParcelRecord {
            parcel_id,
            county_fips: ctx.county_fips.clone(),
            geometry,
            centroid: metrics.centroid,
            simplified_geometry: metrics.simplified,
            bbox: metrics.bbox,
            area_sqft: metrics.area_sqft,
            area_acres: metrics.area_acres,
            perimeter_ft: metrics.perimeter_ft,
            address: normalized.address,
            owner_name: normalized.owner_name,
            owner_address: normalized.owner_address,
            property_value: normalized.property_value,
            assessed_value: normalized.assessed_value,
            year_built: normalized.year_built,
            spatial_features: spatial,
            risk_factors: risks,
            property_features: normalized.property_features,
            source_file: raw.source_file.clone(),
            import_batch_id: ctx.import_batch_id.clone(),
            data_vintage: ctx.data_vintage,
        })
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}
