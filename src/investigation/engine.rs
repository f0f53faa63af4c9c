//! Case traceback and convergence analysis
//!
//! Investigators never see lot codes on a consumer's receipt. They ask the
//! reported store for every lot it received around the estimated purchase
//! date and trace each of those back to farms. Farms that many cases reach,
//! and especially farms that are the only explanation for a case, rise to
//! the top of the ranking.

use super::outcome::{classify, confidence_score};
use super::timing::{InvestigationScope, InvestigationTimingConfig};
use super::types::{ConvergenceResult, InvestigationResult, TracebackNode, TracebackPath};
use crate::exposure::IllnessCase;
use crate::flow::{FlowOutcome, NodeInventory, ShipmentMap};
use crate::lineage::probability::geometric_mean;
use crate::lineage::{LineageGraph, Tlc, TrackingMode};
use crate::network::{NodeId, SupplyChainNetwork};
use chrono::{Duration, NaiveDate};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// Days of retailer records requested by default
pub const DEFAULT_RECORD_WINDOW_DAYS: i64 = 14;

/// Probability floor for probabilistic tracebacks
pub const DEFAULT_MIN_PROBABILITY: f64 = 0.01;

/// Read-only records an investigation can request
#[derive(Debug, Clone, Copy)]
pub struct TraceRecords<'a> {
    pub network: &'a SupplyChainNetwork,
    pub graph: &'a LineageGraph,
    pub inventory: &'a NodeInventory,
    pub shipments: &'a ShipmentMap,
}

impl<'a> TraceRecords<'a> {
    pub fn new(
        network: &'a SupplyChainNetwork,
        graph: &'a LineageGraph,
        inventory: &'a NodeInventory,
        shipments: &'a ShipmentMap,
    ) -> Self {
        Self {
            network,
            graph,
            inventory,
            shipments,
        }
    }

    pub fn from_flow(network: &'a SupplyChainNetwork, flow: &'a FlowOutcome) -> Self {
        Self::new(network, &flow.graph, &flow.node_inventory, &flow.tlc_shipment_map)
    }
}

/// Paths per case, aligned with the input case slice
struct CaseTraces {
    per_case: Vec<Vec<TracebackPath>>,
    locations_contacted: BTreeSet<NodeId>,
}

/// Runs tracebacks under one tracking mode
pub struct InvestigationEngine<'a> {
    records: TraceRecords<'a>,
    mode: TrackingMode,
    record_collection_window_days: i64,
    timing: InvestigationTimingConfig,
}

impl<'a> InvestigationEngine<'a> {
    pub fn new(records: TraceRecords<'a>, mode: TrackingMode) -> Self {
        Self {
            records,
            mode,
            record_collection_window_days: DEFAULT_RECORD_WINDOW_DAYS,
            timing: InvestigationTimingConfig::default(),
        }
    }

    pub fn record_window(mut self, days: i64) -> Self {
        self.record_collection_window_days = days;
        self
    }

    pub fn timing(mut self, config: InvestigationTimingConfig) -> Self {
        self.timing = config;
        self
    }

    pub fn is_probabilistic(&self) -> bool {
        self.mode == TrackingMode::Probabilistic
    }

    /// TLCs received at `location` within `window_days / 2` days of `center`
    pub fn tlcs_at_location_in_window(&self, location: &NodeId, center: NaiveDate, window_days: i64) -> Vec<Tlc> {
        let half = Duration::days(window_days.max(0) / 2);
        let (start, end) = (center - half, center + half);
        self.records
            .inventory
            .get(location)
            .into_iter()
            .flatten()
            .filter(|r| {
                let received = r.received_date.date();
                received >= start && received <= end
            })
            .map(|r| r.tlc.clone())
            .collect()
    }

    /// Farm-terminated paths from one TLC in a location's records
    ///
    /// In probabilistic mode a TLC delivered by a hub that only recorded a
    /// distribution of possible lots is expanded to every lot in that
    /// distribution at or above `min_probability`. Each expanded lot carries
    /// the hub's probability, which multiplies the graph probability.
    pub fn traceback_from_tlc(&self, tlc: &Tlc, location: NodeId, min_probability: f64) -> Vec<TracebackPath> {
        let mut to_trace: Vec<(Tlc, f64)> = vec![(tlc.clone(), 1.0)];
        if self.is_probabilistic() {
            if let Some(shipment) = self.records.shipments.get(&(location, tlc.clone())) {
                for (candidate, &p) in &shipment.tlc_probabilities {
                    if p < min_probability {
                        continue;
                    }
                    match to_trace.iter_mut().find(|(t, _)| t == candidate) {
                        Some(entry) => entry.1 = p,
                        None => to_trace.push((candidate.clone(), p)),
                    }
                }
            }
        }

        let floor = if self.is_probabilistic() { min_probability } else { 1.0 };
        let graph = self.records.graph;
        let network = self.records.network;
        let mut paths = Vec::new();

        for (trace_tlc, hub_probability) in to_trace {
            let trace = graph.traceback(trace_tlc.as_str(), floor, None);
            for (reached, &graph_probability) in &trace.tlc_probabilities {
                let Some(farm_id) = graph.get_lot(reached.as_str()).and_then(|lot| lot.created_by) else {
                    continue;
                };
                let Some(farm) = network.farm(&farm_id) else {
                    continue;
                };
                let probability = hub_probability * graph_probability;

                let nodes = trace
                    .path(reached.as_str())
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|hop| {
                        let node_id = graph.get_lot(hop.as_str())?.created_by?;
                        let node = network.get_node(&node_id)?;
                        Some(TracebackNode {
                            node_id,
                            node_name: node.display_name(),
                            node_type: node.node_type(),
                            tlc: hop.clone(),
                            probability,
                        })
                    })
                    .collect();

                paths.push(TracebackPath {
                    starting_location_id: location,
                    starting_tlc: tlc.clone(),
                    nodes,
                    path_probability: probability,
                    terminal_farm_id: farm_id,
                    terminal_farm_name: farm.display_name(),
                });
            }
        }
        paths
    }

    /// Paths for one case; empty when the interview gave nothing to work with
    pub fn traceback_case(&self, case: &IllnessCase, min_probability: f64) -> Vec<TracebackPath> {
        let (Some(location), Some(purchase_date)) = (case.reported_exposure_location_id, case.estimated_purchase_date)
        else {
            return Vec::new();
        };
        if !case.was_interviewed {
            return Vec::new();
        }

        let window = self.record_collection_window_days + case.purchase_date_uncertainty_days;
        self.tlcs_at_location_in_window(&location, purchase_date, window)
            .iter()
            .flat_map(|tlc| self.traceback_from_tlc(tlc, location, min_probability))
            .collect()
    }

    fn trace_cases(&self, cases: &[IllnessCase], min_probability: f64) -> CaseTraces {
        let mut locations_contacted = BTreeSet::new();
        let per_case = cases
            .iter()
            .map(|case| {
                if case.has_usable_interview() {
                    locations_contacted.extend(case.reported_exposure_location_id);
                }
                self.traceback_case(case, min_probability)
            })
            .collect();
        CaseTraces {
            per_case,
            locations_contacted,
        }
    }

    fn converge(&self, cases: &[IllnessCase], traces: &CaseTraces) -> Vec<ConvergenceResult> {
        let mut farm_order: Vec<NodeId> = Vec::new();
        let mut farm_cases: HashMap<NodeId, BTreeSet<usize>> = HashMap::new();
        let mut case_farms: HashMap<usize, HashSet<NodeId>> = HashMap::new();

        for (idx, paths) in traces.per_case.iter().enumerate() {
            for path in paths {
                let farm = path.terminal_farm_id;
                farm_cases
                    .entry(farm)
                    .or_insert_with(|| {
                        farm_order.push(farm);
                        BTreeSet::new()
                    })
                    .insert(idx);
                case_farms.entry(idx).or_default().insert(farm);
            }
        }

        let cases_with_traces = case_farms.len();
        let traced_locations: HashSet<NodeId> = cases
            .iter()
            .enumerate()
            .filter(|(idx, _)| case_farms.contains_key(idx))
            .filter_map(|(_, c)| c.reported_exposure_location_id)
            .collect();
        let usable = cases_with_traces.max(1) as f64;

        let mut results = Vec::new();
        for farm_id in farm_order {
            let Some(farm) = self.records.network.farm(&farm_id) else {
                continue;
            };
            let case_ids = &farm_cases[&farm_id];
            let exclusive_cases = case_ids
                .iter()
                .filter(|&idx| case_farms.get(idx).is_some_and(|farms| farms.len() == 1))
                .count();

            let mut probabilities = Vec::new();
            let mut tlcs = BTreeSet::new();
            let mut locations = BTreeSet::new();
            for &idx in case_ids {
                for path in traces.per_case[idx].iter().filter(|p| p.terminal_farm_id == farm_id) {
                    probabilities.push(path.path_probability);
                    tlcs.insert(path.starting_tlc.clone());
                    locations.insert(path.starting_location_id);
                }
            }

            let aggregate = if self.is_probabilistic() && !probabilities.is_empty() {
                geometric_mean(&probabilities)
            } else {
                1.0
            };
            let confidence = confidence_score(
                exclusive_cases as f64 / usable,
                case_ids.len() as f64 / usable,
                locations.len() as f64 / traced_locations.len().max(1) as f64,
                aggregate,
            );

            results.push(ConvergenceResult {
                farm_id,
                farm_name: farm.display_name(),
                cases_converging: case_ids.len(),
                exclusive_cases,
                total_cases_analyzed: cases_with_traces,
                tlcs_converging: tlcs.into_iter().collect(),
                retail_locations_converging: locations.into_iter().collect(),
                convergence_probability: aggregate,
                confidence_score: confidence,
            });
        }

        results.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(Ordering::Equal)
                .then(b.cases_converging.cmp(&a.cases_converging))
                .then(b.exclusive_cases.cmp(&a.exclusive_cases))
        });
        results
    }

    /// Convergence results sorted by evidence strength
    pub fn analyze_convergence(&self, cases: &[IllnessCase], min_probability: f64) -> Vec<ConvergenceResult> {
        let traces = self.trace_cases(cases, min_probability);
        self.converge(cases, &traces)
    }

    /// Full investigation, scored against `actual_source` when known
    pub fn investigate(
        &self,
        cases: &[IllnessCase],
        actual_source: Option<NodeId>,
        min_probability: f64,
    ) -> InvestigationResult {
        let traces = self.trace_cases(cases, min_probability);
        let convergence_results = self.converge(cases, &traces);

        let mut tlcs = BTreeSet::new();
        let mut glns = BTreeSet::new();
        let mut farms = BTreeSet::new();
        let mut path_probabilities = Vec::new();
        for path in traces.per_case.iter().flatten() {
            path_probabilities.push(path.path_probability);
            farms.insert(path.terminal_farm_id);
            for node in &path.nodes {
                if let Some(gln) = self
                    .records
                    .graph
                    .get_lot(node.tlc.as_str())
                    .and_then(|lot| lot.tlc_source_gln.as_ref())
                {
                    glns.insert(gln.clone());
                }
                tlcs.insert(node.tlc.clone());
            }
        }

        let classification = classify(&convergence_results, actual_source);
        let scope = InvestigationScope {
            locations_contacted: traces.locations_contacted.len(),
            tlcs: tlcs.len(),
            paths: path_probabilities.len(),
            farms: farms.len(),
        };
        let timing_estimate = self.timing.estimate(scope, classification.outcome);

        let top = convergence_results.first();
        let result = InvestigationResult {
            mode: self.mode,
            total_cases_investigated: cases.len(),
            cases_interviewed: cases.iter().filter(|c| c.has_usable_interview()).count(),
            primary_suspect_farm_id: top.map(|r| r.farm_id),
            primary_suspect_farm_name: top.map(|r| r.farm_name.clone()),
            primary_suspect_probability: top.map_or(0.0, |r| r.convergence_probability),
            farms_in_scope: farms.len(),
            tlcs_in_scope: tlcs.len(),
            tlcs_in_scope_locations: glns.len(),
            total_traceback_paths: path_probabilities.len(),
            average_path_probability: path_probabilities.iter().sum::<f64>()
                / path_probabilities.len().max(1) as f64,
            min_path_probability: path_probabilities.iter().copied().reduce(f64::min).unwrap_or(1.0),
            actual_source_farm_id: actual_source,
            identification_outcome: classification.outcome,
            source_rank: classification.source_rank,
            top_two_margin: classification.top_two_margin,
            timing_estimate,
            convergence_results,
        };

        info!(
            mode = ?self.mode,
            cases = result.total_cases_investigated,
            farms_in_scope = result.farms_in_scope,
            paths = result.total_traceback_paths,
            outcome = %result.identification_outcome,
            "investigation complete"
        );
        result
    }

    /// Confidence scores normalised into a distribution keyed by farm name
    pub fn farm_probability_distribution(&self, cases: &[IllnessCase], min_probability: f64) -> BTreeMap<String, f64> {
        let results = self.analyze_convergence(cases, min_probability);
        let total: f64 = results.iter().map(|r| r.confidence_score).sum();
        if total == 0.0 {
            return BTreeMap::new();
        }
        results
            .into_iter()
            .map(|r| (r.farm_name, r.confidence_score / total))
            .collect()
    }
}
