//! Supply-chain network: nodes, registries, and supply edges

mod builder;
mod node;

pub use builder::{NetworkBuilder, NetworkConfig};
pub use node::{
    generate_gln, gs1_check_digit, AssignmentMode, CalculatedMethod, Location, Node, NodeId, NodeKind,
    NodeType,
};

use crate::lineage::ProductCategory;
use crate::transit::{haversine_distance, DEFAULT_DISTANCE_MILES};
use serde::Serialize;
use std::collections::HashMap;

/// A supply relationship between two nodes
#[derive(Debug, Clone, Serialize)]
pub struct SupplyEdge {
    pub source: NodeId,
    pub destination: NodeId,
    pub product_category: ProductCategory,
    /// Pounds per shipment
    pub volume_per_shipment: f64,
    pub shipments_per_week: f64,
    pub distance_miles: f64,
}

/// Node counts for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkSummary {
    pub farms: usize,
    pub packers: usize,
    pub distribution_centers: usize,
    pub processors: usize,
    pub delis: usize,
    pub retailers: usize,
    pub edges: usize,
    pub total_nodes: usize,
}

/// All nodes and supply edges for one simulated run
///
/// Per-kind registries keep insertion order so that seeded runs
/// iterate nodes identically.
#[derive(Debug, Clone, Default)]
pub struct SupplyChainNetwork {
    nodes: HashMap<NodeId, Node>,
    farms: Vec<NodeId>,
    packers: Vec<NodeId>,
    distribution_centers: Vec<NodeId>,
    processors: Vec<NodeId>,
    delis: Vec<NodeId>,
    retailers: Vec<NodeId>,
    edges: Vec<SupplyEdge>,
    suppliers: HashMap<NodeId, Vec<NodeId>>,
    customers: HashMap<NodeId, Vec<NodeId>>,
}

impl SupplyChainNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node in the lookup table and its kind registry
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        let registry = match node.node_type() {
            NodeType::Farm => &mut self.farms,
            NodeType::Packer => &mut self.packers,
            NodeType::DistributionCenter => &mut self.distribution_centers,
            NodeType::Processor => &mut self.processors,
            NodeType::Deli => &mut self.delis,
            NodeType::Retailer => &mut self.retailers,
        };
        if !self.nodes.contains_key(&id) {
            registry.push(id);
        }
        self.nodes.insert(id, node);
        id
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Human-readable name, or a placeholder for unknown IDs
    pub fn node_name(&self, id: &NodeId) -> String {
        match self.nodes.get(id) {
            Some(node) => node.display_name(),
            None => format!("Unknown ({id})"),
        }
    }

    /// Farm record by ID; `None` if absent or not a farm
    pub fn farm(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id).filter(|n| n.is_farm())
    }

    pub fn farm_ids(&self) -> &[NodeId] {
        &self.farms
    }

    pub fn farms(&self) -> impl Iterator<Item = &Node> {
        self.farms.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn packer_ids(&self) -> &[NodeId] {
        &self.packers
    }

    pub fn distribution_center_ids(&self) -> &[NodeId] {
        &self.distribution_centers
    }

    pub fn processor_ids(&self) -> &[NodeId] {
        &self.processors
    }

    pub fn deli_ids(&self) -> &[NodeId] {
        &self.delis
    }

    pub fn retailer_ids(&self) -> &[NodeId] {
        &self.retailers
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Distance between two nodes, defaulting when coordinates are missing
    pub fn distance_between(&self, a: &NodeId, b: &NodeId) -> f64 {
        let coords = |id: &NodeId| self.nodes.get(id).and_then(|n| n.location.coordinates());
        match (coords(a), coords(b)) {
            (Some((lat1, lon1)), Some((lat2, lon2))) => haversine_distance(lat1, lon1, lat2, lon2),
            _ => DEFAULT_DISTANCE_MILES,
        }
    }

    pub fn add_edge(
        &mut self,
        source: NodeId,
        destination: NodeId,
        product_category: ProductCategory,
        volume_per_shipment: f64,
        shipments_per_week: f64,
    ) {
        let distance_miles = self.distance_between(&source, &destination);
        self.edges.push(SupplyEdge {
            source,
            destination,
            product_category,
            volume_per_shipment,
            shipments_per_week,
            distance_miles,
        });
        self.suppliers.entry(destination).or_default().push(source);
        self.customers.entry(source).or_default().push(destination);
    }

    pub fn edges(&self) -> &[SupplyEdge] {
        &self.edges
    }

    /// Outbound edges from a node, in insertion order
    pub fn edges_from<'a>(&'a self, source: &'a NodeId) -> impl Iterator<Item = &'a SupplyEdge> + 'a {
        self.edges.iter().filter(move |e| &e.source == source)
    }

    pub fn suppliers(&self, id: &NodeId) -> &[NodeId] {
        self.suppliers.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn customers(&self, id: &NodeId) -> &[NodeId] {
        self.customers.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            farms: self.farms.len(),
            packers: self.packers.len(),
            distribution_centers: self.distribution_centers.len(),
            processors: self.processors.len(),
            delis: self.delis.len(),
            retailers: self.retailers.len(),
            edges: self.edges.len(),
            total_nodes: self.nodes.len(),
        }
    }
}
