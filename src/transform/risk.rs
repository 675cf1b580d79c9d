//! Peril risk scoring.
//!
//! The heuristic model folds the spatial classification into four scores in
//! [0, 1]. Scores are deterministic and carry no model-version metadata;
//! they are recomputed wholesale on every import.

use crate::models::{RiskFactors, SpatialFeatures};

/// Scores a parcel's peril exposure from its spatial classification.
///
/// Implementations must be pure: same features in, same scores out.
pub trait RiskModel: Send + Sync {
    fn score(&self, features: &SpatialFeatures, lat: f64, lng: f64) -> RiskFactors;
}

/// Geography-weighted heuristic scorer for Florida parcels.
#[derive(Debug, Default)]
pub struct HeuristicRiskModel;

impl HeuristicRiskModel {
    fn hurricane(&self, features: &SpatialFeatures, lat: f64, lng: f64) -> f64 {
        let mut score: f64 = 0.3;
        if features.coastal {
            score += 0.3;
        }
        // South Florida and the Atlantic side see more landfalls
        if lat < 26.0 {
            score += 0.2;
        }
        if lng > -81.0 {
            score += 0.1;
        }
        score.clamp(0.0, 1.0)
    }

    fn flood(&self, features: &SpatialFeatures) -> f64 {
        let mut score = features.flood_risk.unwrap_or(0.1);
        if features.near_water {
            score += 0.2;
        }
        if features.low_elevation {
            score += 0.3;
        }
        score.clamp(0.0, 1.0)
    }

    fn wildfire(&self, features: &SpatialFeatures) -> f64 {
        if features.urban {
            0.05
        } else {
            0.15
        }
    }

    /// Storm surge applies only to coastal parcels; inland parcels score
    /// None rather than zero so the column stays unset.
    fn storm_surge(&self, features: &SpatialFeatures) -> Option<f64> {
        if !features.coastal {
            return None;
        }
        let score = match features.elevation_ft {
            Some(e) if e < 5.0 => 0.9,
            Some(e) if e < 15.0 => 0.6,
            _ => 0.4,
        };
        Some(score)
    }
}

impl RiskModel for HeuristicRiskModel {
    fn score(&self, features: &SpatialFeatures, lat: f64, lng: f64) -> RiskFactors {
        RiskFactors {
            hurricane: self.hurricane(features, lat, lng),
            flood: self.flood(features),
            wildfire: self.wildfire(features),
            storm_surge: self.storm_surge(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coastal_features() -> SpatialFeatures {
        SpatialFeatures {
            coastal: true,
            waterfront: false,
            near_water: false,
            urban: true,
            flood_zone: Some("AE".to_string()),
            flood_risk: Some(0.7),
            elevation_ft: Some(4.0),
            low_elevation: true,
        }
    }

    #[test]
    fn test_miami_waterfront_scenario() {
        // Low-lying coastal South Florida parcel east of -81
        let scores = HeuristicRiskModel.score(&coastal_features(), 25.76, -80.19);
        assert!(scores.hurricane >= 0.8);
        assert_eq!(scores.flood, 1.0); // 0.7 zone + 0.3 low elevation, clamped
        assert_eq!(scores.wildfire, 0.05);
        assert_eq!(scores.storm_surge, Some(0.9));
        assert!(scores.in_bounds());
    }

    #[test]
    fn test_inland_parcel_scores() {
        let features = SpatialFeatures {
            coastal: false,
            urban: false,
            flood_zone: None,
            flood_risk: None,
            elevation_ft: Some(120.0),
            low_elevation: false,
            ..coastal_features()
        };
        let scores = HeuristicRiskModel.score(&features, 30.5, -84.3);
        assert_eq!(scores.hurricane, 0.3);
        assert!((scores.flood - 0.1).abs() < 1e-9);
        assert_eq!(scores.wildfire, 0.15);
        assert_eq!(scores.storm_surge, None);
    }

    #[test]
    fn test_surge_elevation_bands() {
        let mut features = coastal_features();
        features.elevation_ft = Some(4.9);
        assert_eq!(HeuristicRiskModel.storm_surge(&features), Some(0.9));
        features.elevation_ft = Some(10.0);
        assert_eq!(HeuristicRiskModel.storm_surge(&features), Some(0.6));
        features.elevation_ft = Some(40.0);
        assert_eq!(HeuristicRiskModel.storm_surge(&features), Some(0.4));
        features.elevation_ft = None;
        assert_eq!(HeuristicRiskModel.storm_surge(&features), Some(0.4));
    }

    #[test]
    fn test_scores_stay_clamped() {
        let mut features = coastal_features();
        features.flood_risk = Some(0.9);
        features.near_water = true;
        let scores = HeuristicRiskModel.score(&features, 24.6, -80.0);
        assert_eq!(scores.hurricane, 0.9); // 0.3 + 0.3 + 0.2 + 0.1
        assert_eq!(scores.flood, 1.0);
        assert!(scores.in_bounds());
    }
}
