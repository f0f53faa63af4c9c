//! Shared fixtures for outbreak investigation tests
//!
//! `Scenario` builds a hand-wired supply chain: farms, stores, lots with
//! exact or hub-recorded lineage, and store shelves. Tests then interview
//! cases at the stores and investigate.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use outbreak_trace::flow::{InventoryRecord, NodeInventory, Shipment, ShipmentMap};
use outbreak_trace::network::{Location, Node, NodeKind};
use outbreak_trace::{
    IllnessCase, InvestigationEngine, LineageGraph, Lot, NodeId, ProductCategory, SimulationConfig,
    SupplyChainNetwork, Tlc, TraceRecords, TrackingMode,
};
use std::collections::BTreeMap;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).expect("valid June date")
}

pub fn at(d: u32, hour: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, 0, 0).expect("valid hour")
}

#[derive(Default)]
pub struct Scenario {
    pub network: SupplyChainNetwork,
    pub graph: LineageGraph,
    pub inventory: NodeInventory,
    pub shipments: ShipmentMap,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn farm(&mut self, name: &str) -> NodeId {
        self.network.add_node(Node::new(
            NodeId::new(),
            Location::default(),
            NodeKind::Farm {
                farm_name: name.to_string(),
                growing_areas: vec!["F1".to_string()],
            },
        ))
    }

    pub fn processor(&mut self, name: &str) -> NodeId {
        self.network.add_node(Node::new(
            NodeId::new(),
            Location::default(),
            NodeKind::Processor {
                facility_name: name.to_string(),
                lot_code_prefix: "PROC".to_string(),
            },
        ))
    }

    pub fn store(&mut self, name: &str) -> NodeId {
        self.network.add_node(Node::new(
            NodeId::new(),
            Location::default(),
            NodeKind::Retailer {
                store_name: name.to_string(),
                store_number: "0001".to_string(),
                deli: None,
            },
        ))
    }

    /// Register a lot created at `creator`, assigned at GLN `gln`
    pub fn lot(&mut self, tlc: &str, creator: NodeId, gln: &str) {
        self.graph
            .add_lot(Lot::new(tlc, at(1, 8)).created_by(creator).tlc_source_gln(gln));
    }

    /// Exact lineage: every input is a certain source of `output`
    pub fn transform(&mut self, inputs: &[&str], output: &str) {
        for input in inputs {
            self.graph.link_lots(input, output, 1.0);
        }
    }

    /// Put `tlc` on a store shelf, received on `received_day`
    pub fn stock(&mut self, store: NodeId, tlc: &str, received_day: u32) {
        self.inventory.entry(store).or_default().push(InventoryRecord {
            tlc: Tlc::from(tlc),
            product_category: ProductCategory::FreshCucumbers,
            quantity_received: 100.0,
            quantity_remaining: 100.0,
            received_date: at(received_day, 9),
            available_date: at(received_day, 13),
            source_node: NodeId::new(),
        });
    }

    /// The hub that shipped `tlc` to `store` recorded only a distribution
    pub fn hub_record(&mut self, store: NodeId, tlc: &str, candidates: &[(&str, f64)], received_day: u32) {
        self.shipments.insert(
            (store, Tlc::from(tlc)),
            Shipment {
                id: self.shipments.len(),
                source: NodeId::new(),
                destination: store,
                ship_date: at(received_day - 1, 8),
                receive_date: at(received_day, 9),
                product_category: ProductCategory::FreshCucumbers,
                quantity: 100.0,
                source_tlcs: vec![Tlc::from(tlc)],
                dest_tlc: None,
                tlc_probabilities: candidates
                    .iter()
                    .map(|(candidate, p)| (Tlc::from(*candidate), *p))
                    .collect::<BTreeMap<_, _>>(),
            },
        );
    }

    pub fn records(&self) -> TraceRecords<'_> {
        TraceRecords::new(&self.network, &self.graph, &self.inventory, &self.shipments)
    }

    pub fn engine(&self, mode: TrackingMode) -> InvestigationEngine<'_> {
        InvestigationEngine::new(self.records(), mode)
    }
}

/// A case that bought at `store` on `purchase_day` and remembered it
pub fn interviewed_case(id: usize, store: NodeId, purchase_day: u32) -> IllnessCase {
    IllnessCase::new(id, store, day(purchase_day)).interviewed(store, day(purchase_day), 3)
}

/// A case that was never interviewed
pub fn silent_case(id: usize, store: NodeId, purchase_day: u32) -> IllnessCase {
    IllnessCase::new(id, store, day(purchase_day))
}

/// A small, fast end-to-end configuration
pub fn small_simulation(seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig {
        start_date: Some(day(1)),
        simulation_days: 14,
        random_seed: Some(seed),
        ..SimulationConfig::default()
    };
    config.network.num_farms = 3;
    config.network.num_retailers = 6;
    config
}
