//! Contamination events, source-lot seeding, and cross-event propagation

use crate::lineage::probability::union;
use crate::lineage::{LineageGraph, Tlc};
use crate::network::NodeId;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised when constructing a contamination event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContaminationError {
    #[error("contamination_rate must be between 0.0 and 1.0, got {0}")]
    InvalidRate(f64),

    #[error("end_date ({end}) must be >= start_date ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Result type for contamination operations
pub type ContaminationResult<T> = Result<T, ContaminationError>;

/// Where a source-level lot came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotOrigin {
    pub farm_id: NodeId,
    pub harvest_date: NaiveDate,
    pub growing_area: Option<String>,
}

/// A contamination introduced at one farm over a date range
#[derive(Debug, Clone, Serialize)]
pub struct ContaminationEvent {
    pub farm_id: NodeId,
    pub farm_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pathogen: String,
    pub contamination_source: String,
    /// `None` affects every growing area
    pub affected_growing_areas: Option<Vec<String>>,
    pub contamination_rate: f64,
    pub contaminated_tlcs: Vec<Tlc>,
}

impl ContaminationEvent {
    /// Create a validated event covering all growing areas
    pub fn new(
        farm_id: NodeId,
        farm_name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        contamination_rate: f64,
    ) -> ContaminationResult<Self> {
        if !(0.0..=1.0).contains(&contamination_rate) {
            return Err(ContaminationError::InvalidRate(contamination_rate));
        }
        if end_date < start_date {
            return Err(ContaminationError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            farm_id,
            farm_name: farm_name.into(),
            start_date,
            end_date,
            pathogen: "Salmonella".to_string(),
            contamination_source: "Unknown".to_string(),
            affected_growing_areas: None,
            contamination_rate,
            contaminated_tlcs: Vec::new(),
        })
    }

    pub fn pathogen(mut self, pathogen: impl Into<String>) -> Self {
        self.pathogen = pathogen.into();
        self
    }

    pub fn source(mut self, description: impl Into<String>) -> Self {
        self.contamination_source = description.into();
        self
    }

    pub fn growing_areas(mut self, areas: Vec<String>) -> Self {
        self.affected_growing_areas = Some(areas);
        self
    }

    pub fn is_date_in_range(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Area restrictions apply only when both sides know the area
    pub fn is_lot_affected(&self, harvest_date: NaiveDate, growing_area: Option<&str>) -> bool {
        if !self.is_date_in_range(harvest_date) {
            return false;
        }
        match (&self.affected_growing_areas, growing_area) {
            (Some(areas), Some(area)) => areas.iter().any(|a| a == area),
            _ => true,
        }
    }
}

/// Counts by contamination probability band
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbabilityBands {
    /// p > 0.75
    pub high: usize,
    /// 0.25 <= p <= 0.75
    pub medium: usize,
    /// p < 0.25
    pub low: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFarm {
    pub id: NodeId,
    pub name: String,
    pub pathogen: String,
}

/// Outcome of seeding and propagation
#[derive(Debug, Clone, Serialize)]
pub struct ContaminationSummary {
    pub num_contamination_events: usize,
    pub source_farms: Vec<SourceFarm>,
    pub num_source_tlcs: usize,
    pub num_affected_tlcs: usize,
    pub contamination_by_probability: ProbabilityBands,
}

/// Seeds contamination into farm lots and propagates it downstream
///
/// The seeder never holds the graph; each mutating call borrows it.
#[derive(Debug, Clone, Default)]
pub struct ContaminationSeeder {
    events: Vec<ContaminationEvent>,
    /// Seeded source lots and the rate each was seeded at
    source_rates: BTreeMap<Tlc, f64>,
    propagation: BTreeMap<Tlc, f64>,
}

impl ContaminationSeeder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: ContaminationEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ContaminationEvent] {
        &self.events
    }

    /// Mark every source lot matched by a registered event
    ///
    /// Returns the source-lot contamination rates. When events overlap on
    /// the same lot the last matching event wins.
    pub fn seed_contamination(
        &mut self,
        graph: &mut LineageGraph,
        lot_metadata: &BTreeMap<Tlc, LotOrigin>,
    ) -> BTreeMap<Tlc, f64> {
        let mut seeded = BTreeMap::new();
        for (tlc, origin) in lot_metadata {
            for event in self.events.iter_mut() {
                if event.farm_id != origin.farm_id {
                    continue;
                }
                if !event.is_lot_affected(origin.harvest_date, origin.growing_area.as_deref()) {
                    continue;
                }
                seeded.insert(tlc.clone(), event.contamination_rate);
                self.source_rates.insert(tlc.clone(), event.contamination_rate);
                if !event.contaminated_tlcs.contains(tlc) {
                    event.contaminated_tlcs.push(tlc.clone());
                }
                graph.mark_contaminated(
                    tlc.as_str(),
                    event.contamination_rate,
                    Some(event.contamination_source.as_str()),
                );
            }
        }
        info!(source_lots = seeded.len(), events = self.events.len(), "seeded contamination");
        seeded
    }

    /// Rebuild the propagation map from every seeded source lot
    ///
    /// Each source starts from its seeded rate, not from lot state. Per-source
    /// maps are merged by probabilistic union.
    pub fn propagate_contamination(&mut self, graph: &mut LineageGraph) -> &BTreeMap<Tlc, f64> {
        self.propagation.clear();
        for (source, &rate) in &self.source_rates {
            let reached = graph.propagate_contamination(source.as_str(), rate);
            for (tlc, p) in reached {
                self.propagation
                    .entry(tlc)
                    .and_modify(|existing| *existing = union(*existing, p))
                    .or_insert(p);
            }
        }
        debug!(affected = self.propagation.len(), "propagation map rebuilt");
        &self.propagation
    }

    pub fn propagation(&self) -> &BTreeMap<Tlc, f64> {
        &self.propagation
    }

    /// TLCs whose propagated probability exceeds `min_probability`
    pub fn contaminated_tlcs(&self, min_probability: f64) -> Vec<Tlc> {
        self.propagation
            .iter()
            .filter(|(_, &p)| p > min_probability)
            .map(|(tlc, _)| tlc.clone())
            .collect()
    }

    pub fn source_rates(&self) -> &BTreeMap<Tlc, f64> {
        &self.source_rates
    }

    pub fn source_farm_ids(&self) -> BTreeSet<NodeId> {
        self.events.iter().map(|e| e.farm_id).collect()
    }

    pub fn summary(&self) -> ContaminationSummary {
        let mut bands = ProbabilityBands::default();
        for &p in self.propagation.values() {
            if p > 0.75 {
                bands.high += 1;
            } else if p >= 0.25 {
                bands.medium += 1;
            } else {
                bands.low += 1;
            }
        }
        ContaminationSummary {
            num_contamination_events: self.events.len(),
            source_farms: self
                .events
                .iter()
                .map(|e| SourceFarm {
                    id: e.farm_id,
                    name: e.farm_name.clone(),
                    pathogen: e.pathogen.clone(),
                })
                .collect(),
            num_source_tlcs: self.source_rates.len(),
            num_affected_tlcs: self.propagation.len(),
            contamination_by_probability: bands,
        }
    }
}
