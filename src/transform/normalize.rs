//! Record normalization: source attribute maps to canonical fields.
//!
//! Source files disagree on column names (`OWN_NAME` vs `OWNER_NAME`,
//! `TOT_LVG_AR` vs `SQ_FT`), so every canonical field is mapped through an
//! explicit synonym table rather than ad hoc lookups. Numeric parsing is
//! defensive: non-numeric characters are stripped and failures yield None,
//! never an error.

use regex::Regex;

use crate::models::{OwnerAddress, PropertyFeatures};
use crate::sources::{attr, AttrMap};

// Synonym tables, drawn from the Florida DOR statewide layout plus the
// county-specific exports this pipeline has encountered.
const PARCEL_ID: &[&str] = &["PARCEL_ID", "PARCELID", "PARCEL_NO", "PARCELNO", "PIN", "FOLIO"];
const OWNER_NAME: &[&str] = &["OWN_NAME", "OWNER_NAME", "OWNER", "OWN1"];

const SITE_HOUSE_NO: &[&str] = &["HOUSE_NO", "HOUSE_NUMBER", "ST_NUM"];
const SITE_STREET: &[&str] = &["PHY_ADDR1", "SITE_ADDR", "SITUS_ADDR", "PROPERTY_ADDRESS", "ADDRESS"];
const SITE_CITY: &[&str] = &["PHY_CITY", "SITE_CITY", "SITUS_CITY", "CITY"];
const SITE_STATE: &[&str] = &["PHY_STATE", "SITE_STATE", "STATE"];
const SITE_ZIP: &[&str] = &["PHY_ZIPCD", "SITE_ZIP", "ZIP", "ZIPCODE"];

const OWNER_STREET: &[&str] = &["OWN_ADDR1", "OWNER_ADDR", "MAIL_ADDR1"];
const OWNER_CITY: &[&str] = &["OWN_CITY", "MAIL_CITY"];
const OWNER_STATE: &[&str] = &["OWN_STATE", "MAIL_STATE"];
const OWNER_ZIP: &[&str] = &["OWN_ZIPCD", "OWN_ZIP", "MAIL_ZIP"];

const PROPERTY_VALUE: &[&str] = &["JV", "TOTAL_VAL", "PROPERTY_VALUE", "MARKET_VALUE"];
const ASSESSED_VALUE: &[&str] = &["AV_NSD", "TV_NSD", "ASSESSED_VALUE", "ASSESSED_VAL"];
const YEAR_BUILT: &[&str] = &["ACT_YR_BLT", "EFF_YR_BLT", "YEAR_BUILT", "YR_BLT"];

const SQUARE_FEET: &[&str] = &["TOT_LVG_AR", "LIVING_AREA", "SQ_FT", "LIVING_SQFT"];
const BEDROOMS: &[&str] = &["BEDROOMS", "BEDROOM_CNT", "BEDS"];
const BATHROOMS: &[&str] = &["BATHROOMS", "BATHROOM_CNT", "BATHS"];
const PROPERTY_TYPE: &[&str] = &["DOR_UC", "PROP_TYPE", "USE_CODE", "PROPERTY_TYPE"];
const CONSTRUCTION_TYPE: &[&str] = &["CONST_TYPE", "CONSTRUCTION", "CONST_CLASS"];
const ROOF_TYPE: &[&str] = &["ROOF_TYPE", "ROOF"];

/// Earliest build year considered plausible; DOR uses 0 for unknown.
const MIN_PLAUSIBLE_YEAR: i32 = 1700;

/// Parse a numeric value defensively: strip everything that is not a
/// digit, sign, or decimal point, then parse. None on failure.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Concatenate address parts, uppercased and whitespace-collapsed.
/// None when every part is empty.
pub fn standardize_address(parts: &[Option<&str>]) -> Option<String> {
    let joined = parts
        .iter()
        .filter_map(|p| *p)
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Canonical fields extracted from one attribute map.
#[derive(Debug, Clone, Default)]
pub struct NormalizedAttrs {
    pub parcel_id: Option<String>,
    pub address: Option<String>,
    pub owner_name: Option<String>,
    pub owner_address: OwnerAddress,
    pub property_value: Option<f64>,
    pub assessed_value: Option<f64>,
    pub year_built: Option<i32>,
    pub property_features: PropertyFeatures,
}

/// Synonym-table driven attribute normalizer.
pub struct Normalizer {
    corporate: Regex,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            // Corporate suffixes from the upstream owner classifier
            corporate: Regex::new(r"(?i)\b(LLC|INC|CORP|LTD|LP|TRUST)\b")
                .expect("static regex"),
        }
    }

    /// The parcel identifier, if the record carries one under any synonym.
    pub fn parcel_id(&self, attrs: &AttrMap) -> Option<String> {
        attr(attrs, PARCEL_ID).map(|id| id.trim().to_string())
    }

    /// Map an attribute map onto the canonical record fields.
    pub fn normalize(&self, attrs: &AttrMap, current_year: i32) -> NormalizedAttrs {
        let owner_name = attr(attrs, OWNER_NAME).map(|s| s.trim().to_uppercase());
        let is_corporate_owner = owner_name
            .as_deref()
            .map(|name| self.corporate.is_match(name))
            .unwrap_or(false);

        let year_built = attr(attrs, YEAR_BUILT)
            .and_then(parse_numeric)
            .map(|y| y as i32)
            .filter(|y| *y >= MIN_PLAUSIBLE_YEAR);

        let building_age = year_built
            .map(|y| f64::from(current_year - y))
            .map(|age| age.clamp(0.0, 200.0));

        NormalizedAttrs {
            parcel_id: self.parcel_id(attrs),
            address: standardize_address(&[
                attr(attrs, SITE_HOUSE_NO),
                attr(attrs, SITE_STREET),
                attr(attrs, SITE_CITY),
                attr(attrs, SITE_STATE),
                attr(attrs, SITE_ZIP),
            ]),
            owner_name,
            owner_address: OwnerAddress {
                street: attr(attrs, OWNER_STREET).map(|s| s.trim().to_uppercase()),
                city: attr(attrs, OWNER_CITY).map(|s| s.trim().to_uppercase()),
                state: attr(attrs, OWNER_STATE).map(|s| s.trim().to_uppercase()),
                zip: attr(attrs, OWNER_ZIP).map(|s| s.trim().to_string()),
            },
            property_value: attr(attrs, PROPERTY_VALUE).and_then(parse_numeric),
            assessed_value: attr(attrs, ASSESSED_VALUE).and_then(parse_numeric),
            year_built,
            property_features: PropertyFeatures {
                square_feet: attr(attrs, SQUARE_FEET).and_then(parse_numeric),
                bedrooms: attr(attrs, BEDROOMS).and_then(parse_numeric),
                bathrooms: attr(attrs, BATHROOMS).and_then(parse_numeric),
                property_type: attr(attrs, PROPERTY_TYPE).map(|s| s.trim().to_string()),
                construction_type: attr(attrs, CONSTRUCTION_TYPE).map(|s| s.trim().to_string()),
                roof_type: attr(attrs, ROOF_TYPE).map(|s| s.trim().to_string()),
                building_age,
                shape_complexity: None, // filled from geometry metrics
                is_corporate_owner,
            },
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_numeric_strips_noise() {
        assert_eq!(parse_numeric("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric("185000"), Some(185000.0));
        assert_eq!(parse_numeric("-12"), Some(-12.0));
        assert_eq!(parse_numeric("n/a"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn test_standardize_address() {
        let address = standardize_address(&[
            Some("123"),
            Some("Main St"),
            Some("Punta Gorda"),
            Some("fl"),
            Some("33950"),
        ]);
        assert_eq!(
            address.as_deref(),
            Some("123 MAIN ST PUNTA GORDA FL 33950")
        );
        assert_eq!(standardize_address(&[None, Some("  "), None]), None);
    }

    #[test]
    fn test_synonym_mapping() {
        let normalizer = Normalizer::new();
        let n = normalizer.normalize(
            &attrs(&[
                ("PARCELID", "402101-001"),
                ("OWNER_NAME", "Acme Holdings LLC"),
                ("JV", "$250,000"),
                ("TV_NSD", "210000"),
                ("ACT_YR_BLT", "1987"),
                ("SQ_FT", "1,850"),
                ("DOR_UC", "01"),
            ]),
            2025,
        );
        assert_eq!(n.parcel_id.as_deref(), Some("402101-001"));
        assert_eq!(n.owner_name.as_deref(), Some("ACME HOLDINGS LLC"));
        assert!(n.property_features.is_corporate_owner);
        assert_eq!(n.property_value, Some(250_000.0));
        assert_eq!(n.assessed_value, Some(210_000.0));
        assert_eq!(n.year_built, Some(1987));
        assert_eq!(n.property_features.building_age, Some(38.0));
        assert_eq!(n.property_features.square_feet, Some(1850.0));
        assert_eq!(n.property_features.property_type.as_deref(), Some("01"));
    }

    #[test]
    fn test_individual_owner_not_corporate() {
        let normalizer = Normalizer::new();
        let n = normalizer.normalize(&attrs(&[("OWN_NAME", "RALPH SMITH")]), 2025);
        assert!(!n.property_features.is_corporate_owner);
    }

    #[test]
    fn test_unknown_year_is_none() {
        let normalizer = Normalizer::new();
        let n = normalizer.normalize(&attrs(&[("EFF_YR_BLT", "0")]), 2025);
        assert_eq!(n.year_built, None);
        assert_eq!(n.property_features.building_age, None);
    }

    #[test]
    fn test_unparseable_numeric_is_none_not_error() {
        let normalizer = Normalizer::new();
        let n = normalizer.normalize(&attrs(&[("JV", "UNKNOWN")]), 2025);
        assert_eq!(n.property_value, None);
    }
}
