//! Weighted depth-first traceback and traceforward

use super::graph::LineageGraph;
use super::lot::Tlc;
use super::path::{Direction, TracePath};
use std::collections::HashSet;

/// Query for tracing lineage from a starting lot
///
/// ```
/// use outbreak_trace::lineage::{Direction, LineageGraph, TraceQuery};
///
/// let graph = LineageGraph::new();
/// let result = TraceQuery::from("D1")
///     .direction(Direction::Backward)
///     .min_probability(1.0)
///     .execute(&graph);
/// assert!(result.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct TraceQuery {
    pub origin: Tlc,
    pub direction: Direction,
    /// Branches whose cumulative probability falls below this are pruned
    pub min_probability: f64,
    /// Depth 0 is the origin; `None` is unbounded
    pub max_depth: Option<usize>,
}

struct Frame {
    tlc: Tlc,
    probability: f64,
    depth: usize,
    path: Vec<Tlc>,
}

impl TraceQuery {
    pub fn from(origin: impl Into<Tlc>) -> Self {
        Self {
            origin: origin.into(),
            direction: Direction::Backward,
            min_probability: 0.0,
            max_depth: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn min_probability(mut self, min_probability: f64) -> Self {
        self.min_probability = min_probability;
        self
    }

    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run the traversal against a graph
    ///
    /// Uses an explicit stack; children are pushed in reverse so they are
    /// visited in insertion order. A TLC is marked visited only once it
    /// passes the depth and probability checks.
    pub fn execute(&self, graph: &LineageGraph) -> TracePath {
        let mut result = TracePath::new(self.origin.clone(), self.direction);
        if !graph.contains(self.origin.as_str()) {
            return result;
        }

        let mut visited: HashSet<Tlc> = HashSet::new();
        let mut stack = vec![Frame {
            tlc: self.origin.clone(),
            probability: 1.0,
            depth: 0,
            path: Vec::new(),
        }];

        while let Some(frame) = stack.pop() {
            if visited.contains(&frame.tlc) {
                continue;
            }
            if self.max_depth.is_some_and(|max| frame.depth > max) {
                continue;
            }
            if frame.probability < self.min_probability {
                continue;
            }

            visited.insert(frame.tlc.clone());
            let mut path = frame.path;
            path.push(frame.tlc.clone());
            result.add_tlc(frame.tlc.clone(), frame.probability, path.clone());

            let edges = match self.direction {
                Direction::Backward => graph.backward_edges(frame.tlc.as_str()),
                Direction::Forward => graph.forward_edges(frame.tlc.as_str()),
            };
            for (next, weight) in edges.iter().rev() {
                stack.push(Frame {
                    tlc: next.clone(),
                    probability: frame.probability * weight,
                    depth: frame.depth + 1,
                    path: path.clone(),
                });
            }
        }

        result
    }
}
