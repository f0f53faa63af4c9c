//! Traceability lots and their identifiers

use crate::network::NodeId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Traceability lot code
///
/// Serializes as a plain string. Lookups in TLC-keyed maps accept `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tlc(String);

impl Tlc {
    /// Create a TLC from any string-like value
    pub fn from_string(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tlc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tlc {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Tlc {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Tlc {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Product categories moving through the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    FreshCucumbers,
    CucumberSalad,
    DeliSalad,
}

/// How a lot's ancestry was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Exact one-to-one lot linkage
    Deterministic,
    /// Linkage inferred from inventory heuristics
    Probabilistic,
}

/// A traceability lot record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub tlc: Tlc,
    pub created_at: NaiveDateTime,
    /// Node that formed the lot (harvest or transformation)
    pub created_by: Option<NodeId>,
    /// GLN of the location where the TLC was assigned
    pub tlc_source_gln: Option<String>,
    pub product_category: ProductCategory,
    pub product_description: String,
    pub initial_quantity: f64,
    pub quantity_unit: String,
    /// Exact ancestry
    pub source_tlcs: Vec<Tlc>,
    /// Uncertain ancestry with per-source weight
    pub source_tlc_probabilities: BTreeMap<Tlc, f64>,
    pub destination_tlcs: Vec<Tlc>,
    pub is_contaminated: bool,
    pub contamination_probability: f64,
    pub contamination_source: Option<String>,
}

impl Lot {
    /// Create an uncontaminated lot with no recorded ancestry
    pub fn new(tlc: impl Into<Tlc>, created_at: NaiveDateTime) -> Self {
        Self {
            tlc: tlc.into(),
            created_at,
            created_by: None,
            tlc_source_gln: None,
            product_category: ProductCategory::default(),
            product_description: String::new(),
            initial_quantity: 0.0,
            quantity_unit: "lbs".to_string(),
            source_tlcs: Vec::new(),
            source_tlc_probabilities: BTreeMap::new(),
            destination_tlcs: Vec::new(),
            is_contaminated: false,
            contamination_probability: 0.0,
            contamination_source: None,
        }
    }

    pub fn created_by(mut self, node: NodeId) -> Self {
        self.created_by = Some(node);
        self
    }

    pub fn tlc_source_gln(mut self, gln: impl Into<String>) -> Self {
        self.tlc_source_gln = Some(gln.into());
        self
    }

    pub fn product(mut self, category: ProductCategory, description: impl Into<String>) -> Self {
        self.product_category = category;
        self.product_description = description.into();
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.initial_quantity = quantity;
        self
    }

    /// Add a source lot with certain linkage
    pub fn with_source(mut self, source: impl Into<Tlc>) -> Self {
        self.source_tlcs.push(source.into());
        self
    }

    /// Add a source lot with uncertain linkage
    pub fn with_probabilistic_source(mut self, source: impl Into<Tlc>, weight: f64) -> Self {
        self.source_tlc_probabilities.insert(source.into(), weight);
        self
    }

    pub fn has_probabilistic_sources(&self) -> bool {
        !self.source_tlc_probabilities.is_empty()
    }

    /// Deterministic iff the probabilistic source mapping is empty
    pub fn tracking_mode(&self) -> TrackingMode {
        if self.has_probabilistic_sources() {
            TrackingMode::Probabilistic
        } else {
            TrackingMode::Deterministic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn lot_with_only_exact_sources_is_deterministic() {
        let lot = Lot::new("D1", ts()).with_source("F1");
        assert_eq!(lot.tracking_mode(), TrackingMode::Deterministic);
    }

    #[test]
    fn any_weighted_source_makes_lot_probabilistic() {
        let lot = Lot::new("D1", ts())
            .with_source("F1")
            .with_probabilistic_source("F2", 0.4);
        assert!(lot.has_probabilistic_sources());
        assert_eq!(lot.tracking_mode(), TrackingMode::Probabilistic);
    }

    #[test]
    fn tlc_serializes_as_plain_string() {
        let json = serde_json::to_string(&Tlc::from("F1-20240601-A")).unwrap();
        assert_eq!(json, "\"F1-20240601-A\"");
    }
}
