//! Traceback and traceforward result structures

use super::lot::Tlc;
use serde::Serialize;
use std::collections::BTreeMap;

/// Direction for lineage traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow backward edges toward source lots
    #[default]
    Backward,
    /// Follow forward edges toward derived lots
    Forward,
}

/// Result of a single traceback or traceforward
///
/// Each reached TLC keeps the best cumulative probability seen and the
/// path (starting TLC first) that achieved it.
#[derive(Debug, Clone, Serialize)]
pub struct TracePath {
    pub starting_tlc: Tlc,
    pub direction: Direction,
    pub tlc_probabilities: BTreeMap<Tlc, f64>,
    pub paths: BTreeMap<Tlc, Vec<Tlc>>,
}

impl TracePath {
    pub fn new(starting_tlc: Tlc, direction: Direction) -> Self {
        Self {
            starting_tlc,
            direction,
            tlc_probabilities: BTreeMap::new(),
            paths: BTreeMap::new(),
        }
    }

    /// Record a TLC, replacing an earlier entry only on a strictly higher probability
    pub fn add_tlc(&mut self, tlc: Tlc, probability: f64, path: Vec<Tlc>) {
        let replace = match self.tlc_probabilities.get(&tlc) {
            Some(&existing) => probability > existing,
            None => true,
        };
        if replace {
            self.tlc_probabilities.insert(tlc.clone(), probability);
            self.paths.insert(tlc, path);
        }
    }

    pub fn probability(&self, tlc: &str) -> Option<f64> {
        self.tlc_probabilities.get(tlc).copied()
    }

    pub fn path(&self, tlc: &str) -> Option<&[Tlc]> {
        self.paths.get(tlc).map(|p| p.as_slice())
    }

    pub fn contains(&self, tlc: &str) -> bool {
        self.tlc_probabilities.contains_key(tlc)
    }

    /// TLCs reached with certainty, excluding the starting lot
    pub fn deterministic_tlcs(&self) -> Vec<Tlc> {
        self.tlc_probabilities
            .iter()
            .filter(|(tlc, &p)| p == 1.0 && **tlc != self.starting_tlc)
            .map(|(tlc, _)| tlc.clone())
            .collect()
    }

    /// TLCs reached only through uncertain linkage
    pub fn probabilistic_tlcs(&self) -> Vec<Tlc> {
        self.tlc_probabilities
            .iter()
            .filter(|(tlc, &p)| p < 1.0 && **tlc != self.starting_tlc)
            .map(|(tlc, _)| tlc.clone())
            .collect()
    }

    pub fn total_scope(&self) -> usize {
        self.tlc_probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tlc_probabilities.is_empty()
    }
}
