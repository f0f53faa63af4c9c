//! LineageGraph: directed weighted graph of lot derivation

use super::lot::{Lot, Tlc};
use super::path::{Direction, TracePath};
use super::probability::union;
use super::trace::TraceQuery;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Directed weighted graph over traceability lot codes
///
/// The graph owns every lot record. Contamination fields and ancestry
/// lists are only mutated through graph methods.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    lots: HashMap<Tlc, Lot>,
    /// source -> [(destination, weight)]
    forward: HashMap<Tlc, Vec<(Tlc, f64)>>,
    /// destination -> [(source, weight)]
    backward: HashMap<Tlc, Vec<(Tlc, f64)>>,
}

/// Traceback scope under certain-only vs. all linkage
#[derive(Debug, Clone, Serialize)]
pub struct ScopeComparison {
    pub retail_tlc: Tlc,
    pub deterministic_scope: usize,
    pub probabilistic_scope: usize,
    /// Infinite when the deterministic scope is empty
    pub scope_expansion_factor: f64,
    pub additional_tlcs_in_scope: usize,
    pub deterministic_tlcs: Vec<Tlc>,
    pub probabilistic_only_tlcs: Vec<Tlc>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a lot, overwriting any existing record with the same TLC
    ///
    /// Edges for the lot's recorded sources are added: weight 1.0 for each
    /// exact source, the recorded weight for each probabilistic source.
    pub fn add_lot(&mut self, lot: Lot) {
        let tlc = lot.tlc.clone();
        self.forward.entry(tlc.clone()).or_default();
        self.backward.entry(tlc.clone()).or_default();

        for source in &lot.source_tlcs {
            self.add_edge(source.clone(), tlc.clone(), 1.0);
        }
        for (source, &weight) in &lot.source_tlc_probabilities {
            self.add_edge(source.clone(), tlc.clone(), weight);
        }

        self.lots.insert(tlc, lot);
    }

    fn add_edge(&mut self, source: Tlc, dest: Tlc, weight: f64) {
        self.forward
            .entry(source.clone())
            .or_default()
            .push((dest.clone(), weight));
        self.backward.entry(dest).or_default().push((source, weight));
    }

    /// Link two lots with an edge of the given weight
    ///
    /// The source lot records the destination; the destination records the
    /// source as exact (weight 1.0) or probabilistic (any other weight).
    pub fn link_lots(&mut self, source: &str, dest: &str, weight: f64) {
        let source = Tlc::from(source);
        let dest = Tlc::from(dest);
        self.add_edge(source.clone(), dest.clone(), weight);

        if let Some(lot) = self.lots.get_mut(&source) {
            lot.destination_tlcs.push(dest.clone());
        }
        if let Some(lot) = self.lots.get_mut(&dest) {
            if weight == 1.0 {
                lot.source_tlcs.push(source);
            } else {
                lot.source_tlc_probabilities.insert(source, weight);
            }
        }
    }

    pub fn get_lot(&self, tlc: &str) -> Option<&Lot> {
        self.lots.get(tlc)
    }

    /// Whether the TLC is a registered lot or an edge endpoint
    pub fn contains(&self, tlc: &str) -> bool {
        self.lots.contains_key(tlc) || self.forward.contains_key(tlc) || self.backward.contains_key(tlc)
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values()
    }

    pub fn lot_count(&self) -> usize {
        self.lots.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    pub fn forward_edges(&self, tlc: &str) -> &[(Tlc, f64)] {
        self.forward.get(tlc).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn backward_edges(&self, tlc: &str) -> &[(Tlc, f64)] {
        self.backward.get(tlc).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Find every ancestor reachable at or above `min_probability`
    pub fn traceback(&self, start: &str, min_probability: f64, max_depth: Option<usize>) -> TracePath {
        TraceQuery::from(start)
            .direction(Direction::Backward)
            .min_probability(min_probability)
            .max_depth(max_depth)
            .execute(self)
    }

    /// Find every descendant reachable at or above `min_probability`
    pub fn traceforward(&self, start: &str, min_probability: f64, max_depth: Option<usize>) -> TracePath {
        TraceQuery::from(start)
            .direction(Direction::Forward)
            .min_probability(min_probability)
            .max_depth(max_depth)
            .execute(self)
    }

    /// Set a lot's contamination fields directly
    ///
    /// Returns false when the TLC is not a registered lot.
    pub fn mark_contaminated(&mut self, tlc: &str, probability: f64, source: Option<&str>) -> bool {
        match self.lots.get_mut(tlc) {
            Some(lot) => {
                lot.is_contaminated = true;
                lot.contamination_probability = probability;
                if let Some(source) = source {
                    lot.contamination_source = Some(source.to_string());
                }
                true
            }
            None => false,
        }
    }

    /// Push contamination forward from a source lot
    ///
    /// Every lot in the source's traceforward (the source included) has the
    /// new probability merged into its existing one by probabilistic union.
    /// Returns the per-TLC contamination attributable to this source alone.
    pub fn propagate_contamination(&mut self, source: &str, probability: f64) -> BTreeMap<Tlc, f64> {
        self.mark_contaminated(source, probability, None);

        let mut result = BTreeMap::new();
        result.insert(Tlc::from(source), probability);

        let reached = self.traceforward(source, 0.0, None);
        for (tlc, path_probability) in reached.tlc_probabilities {
            let contamination = probability * path_probability;
            if let Some(lot) = self.lots.get_mut(&tlc) {
                let merged = union(lot.contamination_probability, contamination);
                lot.contamination_probability = merged;
                if merged > 0.0 {
                    lot.is_contaminated = true;
                }
            }
            result.insert(tlc, contamination);
        }

        debug!(source, probability, reached = result.len(), "propagated contamination");
        result
    }

    /// All lots flagged contaminated, ordered by TLC
    pub fn contaminated_lots(&self) -> Vec<&Lot> {
        let mut lots: Vec<&Lot> = self.lots.values().filter(|l| l.is_contaminated).collect();
        lots.sort_by(|a, b| a.tlc.cmp(&b.tlc));
        lots
    }

    /// Compare certain-only traceback scope with full probabilistic scope
    pub fn compare_traceback_scope(&self, retail_tlc: &str) -> ScopeComparison {
        let deterministic = self.traceback(retail_tlc, 1.0, None);
        let probabilistic = self.traceback(retail_tlc, 0.0, None);

        let deterministic_scope = deterministic.total_scope();
        let probabilistic_scope = probabilistic.total_scope();
        let scope_expansion_factor = if deterministic_scope > 0 {
            probabilistic_scope as f64 / deterministic_scope as f64
        } else {
            f64::INFINITY
        };

        let probabilistic_only_tlcs = probabilistic
            .probabilistic_tlcs()
            .into_iter()
            .filter(|tlc| !deterministic.contains(tlc.as_str()))
            .collect();

        ScopeComparison {
            retail_tlc: Tlc::from(retail_tlc),
            deterministic_scope,
            probabilistic_scope,
            scope_expansion_factor,
            additional_tlcs_in_scope: probabilistic_scope.saturating_sub(deterministic_scope),
            deterministic_tlcs: deterministic.deterministic_tlcs(),
            probabilistic_only_tlcs,
        }
    }
}
