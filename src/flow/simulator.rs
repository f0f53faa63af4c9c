//! Day-by-day product flow through a supply-chain network

use super::inventory::{calculated_weights, in_window, take_fifo, InventoryRecord, NodeInventory, Selection};
use super::{FlowError, FlowResult};
use crate::contamination::LotOrigin;
use crate::lineage::{LineageGraph, Lot, ProductCategory, Tlc};
use crate::network::{CalculatedMethod, NodeId, NodeKind, NodeType, SupplyChainNetwork, SupplyEdge};
use crate::transit::{hours_to_duration, Leg, TransitConfig};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

const PACKER_START_OFFSET_DAYS: i64 = 2;
const PROCESSOR_START_OFFSET_DAYS: i64 = 4;
const DC_START_OFFSET_DAYS: i64 = 5;
/// Input pounds consumed per output pound of salad
const PROCESSOR_INPUT_RATIO: f64 = 1.2;
const SALAD_RECIPE: &str = "SALAD";

/// A movement of product between two nodes
#[derive(Debug, Clone, Serialize)]
pub struct Shipment {
    pub id: usize,
    pub source: NodeId,
    pub destination: NodeId,
    pub ship_date: NaiveDateTime,
    pub receive_date: NaiveDateTime,
    pub product_category: ProductCategory,
    pub quantity: f64,
    /// Lots physically in the shipment
    pub source_tlcs: Vec<Tlc>,
    /// Lot created for the shipment, when the shipper transformed product
    pub dest_tlc: Option<Tlc>,
    /// The shipper's recorded estimate of possible lots; empty when exact
    pub tlc_probabilities: BTreeMap<Tlc, f64>,
}

/// Delivering shipment keyed by `(destination, tlc)`
pub type ShipmentMap = HashMap<(NodeId, Tlc), Shipment>;

/// A transformation run at a processor
#[derive(Debug, Clone, Serialize)]
pub struct ProductionBatch {
    pub processor: NodeId,
    pub production_date: NaiveDateTime,
    pub input_quantity: f64,
    pub output_quantity: f64,
    pub input_tlcs: Vec<Tlc>,
    pub output_tlc: Tlc,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowStats {
    pub days: i64,
    pub lots_created: usize,
    pub farm_lots: usize,
    pub shipments_from_farms: usize,
    pub shipments_from_packers: usize,
    pub shipments_from_processors: usize,
    pub shipments_from_dcs: usize,
    pub total_shipments: usize,
    pub production_batches: usize,
    pub deterministic_links: usize,
    pub probabilistic_links: usize,
}

/// Everything a flow run produces
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub graph: LineageGraph,
    pub lot_metadata: BTreeMap<Tlc, LotOrigin>,
    pub node_inventory: NodeInventory,
    pub tlc_shipment_map: ShipmentMap,
    pub shipments: Vec<Shipment>,
    pub batches: Vec<ProductionBatch>,
    pub stats: FlowStats,
}

/// How a node links outbound shipments to inbound lots
#[derive(Debug, Clone, Copy)]
enum Linkage {
    Exact,
    Calculated { method: CalculatedMethod, window_days: u32 },
}

/// Simulates harvests and shipments over a date range
pub struct ProductFlowSimulator<'a> {
    network: &'a SupplyChainNetwork,
    start_date: NaiveDate,
    end_date: NaiveDate,
    transit: TransitConfig,
    graph: LineageGraph,
    lot_metadata: BTreeMap<Tlc, LotOrigin>,
    inventory: NodeInventory,
    shipment_map: ShipmentMap,
    shipments: Vec<Shipment>,
    batches: Vec<ProductionBatch>,
    stats: FlowStats,
}

impl<'a> ProductFlowSimulator<'a> {
    pub fn new(
        network: &'a SupplyChainNetwork,
        start_date: NaiveDate,
        end_date: NaiveDate,
        transit: TransitConfig,
    ) -> FlowResult<Self> {
        if end_date < start_date {
            return Err(FlowError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            network,
            start_date,
            end_date,
            transit,
            graph: LineageGraph::new(),
            lot_metadata: BTreeMap::new(),
            inventory: NodeInventory::new(),
            shipment_map: ShipmentMap::new(),
            shipments: Vec::new(),
            batches: Vec::new(),
            stats: FlowStats::default(),
        })
    }

    /// Run every phase in supply-chain order
    pub fn run<R: Rng + ?Sized>(mut self, rng: &mut R) -> FlowOutcome {
        self.stats.days = (self.end_date - self.start_date).num_days() + 1;
        self.simulate_harvests(rng);
        self.stats.shipments_from_farms = self.simulate_farm_shipments(rng);
        self.stats.shipments_from_packers = self.simulate_packer_shipments(rng);
        self.stats.shipments_from_processors = self.simulate_processing(rng);
        self.stats.shipments_from_dcs = self.simulate_dc_shipments(rng);
        self.stats.total_shipments = self.shipments.len();
        self.stats.production_batches = self.batches.len();

        info!(
            lots = self.stats.lots_created,
            shipments = self.stats.total_shipments,
            probabilistic_links = self.stats.probabilistic_links,
            "product flow simulated"
        );

        FlowOutcome {
            graph: self.graph,
            lot_metadata: self.lot_metadata,
            node_inventory: self.inventory,
            tlc_shipment_map: self.shipment_map,
            shipments: self.shipments,
            batches: self.batches,
            stats: self.stats,
        }
    }

    fn days_from(&self, offset_days: i64) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        (self.start_date + Duration::days(offset_days))
            .iter_days()
            .take_while(move |d| *d <= end)
    }

    fn edges_from_kind(&self, node_type: NodeType) -> Vec<&'a SupplyEdge> {
        let network = self.network;
        network
            .edges()
            .iter()
            .filter(|e| network.get_node(&e.source).map(|n| n.node_type()) == Some(node_type))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn add_to_inventory(
        &mut self,
        node: NodeId,
        tlc: Tlc,
        category: ProductCategory,
        quantity: f64,
        received: NaiveDateTime,
        source: NodeId,
        hold_hours: f64,
    ) {
        let available_date = if hold_hours > 0.0 {
            received + hours_to_duration(hold_hours)
        } else {
            received
        };
        self.inventory.entry(node).or_default().push(InventoryRecord {
            tlc,
            product_category: category,
            quantity_received: quantity,
            quantity_remaining: quantity,
            received_date: received,
            available_date,
            source_node: source,
        });
    }

    /// Choose lots for an outbound movement
    ///
    /// Exact linkage is FIFO. Calculated linkage weighs the lots inside the
    /// node's lookback window (all eligible lots if the window is empty)
    /// while the lots physically shipped are still taken FIFO from that set.
    fn select(
        &mut self,
        node: NodeId,
        category: ProductCategory,
        quantity: f64,
        ship_date: NaiveDateTime,
        linkage: Linkage,
    ) -> Selection {
        let records = self.inventory.entry(node).or_default();
        let eligible: Vec<bool> = records
            .iter()
            .map(|r| r.product_category == category && r.quantity_remaining > 0.0 && r.available_date <= ship_date)
            .collect();
        if !eligible.iter().any(|&e| e) {
            return Selection::default();
        }

        let mut selection = Selection::default();
        let mask = match linkage {
            Linkage::Exact => eligible,
            Linkage::Calculated { method, window_days } => {
                let windowed: Vec<bool> = records
                    .iter()
                    .zip(&eligible)
                    .map(|(r, &e)| e && in_window(r.available_date, ship_date, window_days))
                    .collect();
                let mask = if windowed.iter().any(|&w| w) { windowed } else { eligible };

                let candidates: Vec<&InventoryRecord> =
                    records.iter().zip(&mask).filter(|&(_, &m)| m).map(|(r, _)| r).collect();
                let weights = calculated_weights(method, &candidates, ship_date);
                for (record, weight) in candidates.iter().zip(weights) {
                    selection.probabilities.insert(record.tlc.clone(), weight);
                }
                self.stats.probabilistic_links += selection.probabilities.len();
                mask
            }
        };

        let mut chosen: Vec<&mut InventoryRecord> =
            records.iter_mut().zip(&mask).filter(|&(_, &m)| m).map(|(r, _)| r).collect();
        selection.actual = take_fifo(&mut chosen, quantity);
        self.stats.deterministic_links += selection.actual.len();
        selection
    }

    fn linkage_for(&self, node: &NodeId) -> Linkage {
        let Some(node) = self.network.get_node(node) else {
            return Linkage::Exact;
        };
        match &node.kind {
            NodeKind::DistributionCenter {
                calculated_method,
                date_window_days,
                ..
            } if node.uses_calculated_lots() => Linkage::Calculated {
                method: calculated_method.unwrap_or_default(),
                window_days: *date_window_days,
            },
            _ => Linkage::Exact,
        }
    }

    fn record_shipment(&mut self, mut shipment: Shipment) -> Shipment {
        shipment.id = self.shipments.len();
        self.shipments.push(shipment.clone());
        shipment
    }

    fn simulate_harvests<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let network = self.network;
        let days: Vec<NaiveDate> = self.days_from(0).collect();
        for day in days {
            for farm in network.farms() {
                let NodeKind::Farm { growing_areas, .. } = &farm.kind else {
                    continue;
                };
                for area in growing_areas {
                    let tlc = Tlc::from(farm.farm_lot_code(day, area));
                    let harvested_at = self.transit.random_business_hour(day, rng);
                    let quantity = f64::from(rng.gen_range(3000..=8000u32));

                    self.graph.add_lot(
                        Lot::new(tlc.clone(), harvested_at)
                            .created_by(farm.id)
                            .tlc_source_gln(farm.location.gln.clone())
                            .product(ProductCategory::FreshCucumbers, "Fresh Cucumbers")
                            .quantity(quantity),
                    );
                    self.stats.lots_created += 1;
                    self.stats.farm_lots += 1;
                    self.lot_metadata.insert(
                        tlc.clone(),
                        LotOrigin {
                            farm_id: farm.id,
                            harvest_date: day,
                            growing_area: Some(area.clone()),
                        },
                    );

                    let hold = self.transit.cooling_hold_hours;
                    self.add_to_inventory(
                        farm.id,
                        tlc,
                        ProductCategory::FreshCucumbers,
                        quantity,
                        harvested_at,
                        farm.id,
                        hold,
                    );
                }
            }
        }
    }

    fn simulate_farm_shipments<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut count = 0;
        for edge in self.edges_from_kind(NodeType::Farm) {
            let days: Vec<NaiveDate> = self.days_from(0).collect();
            for day in days {
                if rng.gen::<f64>() >= edge.shipments_per_week / 7.0 {
                    continue;
                }
                let ship_date = self.transit.random_business_hour(day, rng);
                let selection = self.select(
                    edge.source,
                    ProductCategory::FreshCucumbers,
                    edge.volume_per_shipment,
                    ship_date,
                    Linkage::Exact,
                );
                if selection.actual.is_empty() {
                    continue;
                }
                let receive_date = ship_date + self.transit.transit_time(Leg::FarmToPacker, edge.distance_miles, rng);
                let per_lot = edge.volume_per_shipment / selection.actual.len() as f64;
                let hold = self.transit.packer_processing_hours;
                for tlc in &selection.actual {
                    self.add_to_inventory(
                        edge.destination,
                        tlc.clone(),
                        ProductCategory::FreshCucumbers,
                        per_lot,
                        receive_date,
                        edge.source,
                        hold,
                    );
                }
                self.record_shipment(Shipment {
                    id: 0,
                    source: edge.source,
                    destination: edge.destination,
                    ship_date,
                    receive_date,
                    product_category: ProductCategory::FreshCucumbers,
                    quantity: edge.volume_per_shipment,
                    source_tlcs: selection.actual,
                    dest_tlc: None,
                    tlc_probabilities: BTreeMap::new(),
                });
                count += 1;
            }
        }
        count
    }

    fn simulate_packer_shipments<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let network = self.network;
        let mut count = 0;
        for edge in self.edges_from_kind(NodeType::Packer) {
            let to_dc = network
                .get_node(&edge.destination)
                .is_some_and(|n| n.node_type() == NodeType::DistributionCenter);
            let hold = if to_dc { self.transit.dc_receiving_inspection_hours } else { 0.0 };

            let days: Vec<NaiveDate> = self.days_from(PACKER_START_OFFSET_DAYS).collect();
            for day in days {
                if rng.gen::<f64>() >= edge.shipments_per_week / 7.0 {
                    continue;
                }
                let ship_date = self.transit.random_business_hour(day, rng);
                let selection = self.select(
                    edge.source,
                    ProductCategory::FreshCucumbers,
                    edge.volume_per_shipment,
                    ship_date,
                    Linkage::Exact,
                );
                if selection.actual.is_empty() {
                    continue;
                }
                let receive_date = ship_date + self.transit.transit_time(Leg::PackerToDc, edge.distance_miles, rng);
                let per_lot = edge.volume_per_shipment / selection.actual.len() as f64;
                for tlc in &selection.actual {
                    self.add_to_inventory(
                        edge.destination,
                        tlc.clone(),
                        ProductCategory::FreshCucumbers,
                        per_lot,
                        receive_date,
                        edge.source,
                        hold,
                    );
                }
                self.record_shipment(Shipment {
                    id: 0,
                    source: edge.source,
                    destination: edge.destination,
                    ship_date,
                    receive_date,
                    product_category: ProductCategory::FreshCucumbers,
                    quantity: edge.volume_per_shipment,
                    source_tlcs: selection.actual,
                    dest_tlc: None,
                    tlc_probabilities: BTreeMap::new(),
                });
                count += 1;
            }
        }
        count
    }

    /// Processors turn fresh lots into salad lots and ship them to DCs
    fn simulate_processing<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let network = self.network;
        let mut count = 0;
        for edge in self.edges_from_kind(NodeType::Processor) {
            let Some(processor) = network.get_node(&edge.source) else {
                continue;
            };
            let days: Vec<NaiveDate> = self.days_from(PROCESSOR_START_OFFSET_DAYS).collect();
            for day in days {
                if rng.gen::<f64>() >= edge.shipments_per_week / 7.0 {
                    continue;
                }
                let produced_at = self.transit.random_business_hour(day, rng);
                let input_quantity = edge.volume_per_shipment * PROCESSOR_INPUT_RATIO;
                let selection = self.select(
                    edge.source,
                    ProductCategory::FreshCucumbers,
                    input_quantity,
                    produced_at,
                    Linkage::Exact,
                );
                if selection.actual.is_empty() {
                    continue;
                }

                let inputs: Vec<String> = selection.actual.iter().map(|t| t.to_string()).collect();
                let output = Tlc::from(processor.transformation_lot_code(day, SALAD_RECIPE, &inputs));
                self.graph.add_lot(
                    Lot::new(output.clone(), produced_at)
                        .created_by(processor.id)
                        .tlc_source_gln(processor.location.gln.clone())
                        .product(ProductCategory::CucumberSalad, "Processed Cucumber Salad")
                        .quantity(edge.volume_per_shipment),
                );
                for input in &selection.actual {
                    self.graph.link_lots(input.as_str(), output.as_str(), 1.0);
                }
                self.stats.lots_created += 1;
                self.batches.push(ProductionBatch {
                    processor: processor.id,
                    production_date: produced_at,
                    input_quantity,
                    output_quantity: edge.volume_per_shipment,
                    input_tlcs: selection.actual,
                    output_tlc: output.clone(),
                });

                let receive_date =
                    produced_at + self.transit.transit_time(Leg::ProcessorToDc, edge.distance_miles, rng);
                let hold = self.transit.dc_receiving_inspection_hours;
                self.add_to_inventory(
                    edge.destination,
                    output.clone(),
                    ProductCategory::CucumberSalad,
                    edge.volume_per_shipment,
                    receive_date,
                    edge.source,
                    hold,
                );
                self.record_shipment(Shipment {
                    id: 0,
                    source: edge.source,
                    destination: edge.destination,
                    ship_date: produced_at,
                    receive_date,
                    product_category: ProductCategory::CucumberSalad,
                    quantity: edge.volume_per_shipment,
                    source_tlcs: vec![output.clone()],
                    dest_tlc: Some(output),
                    tlc_probabilities: BTreeMap::new(),
                });
                count += 1;
            }
        }
        count
    }

    /// DCs pass lots through to retailers and delis without relabeling
    fn simulate_dc_shipments<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut count = 0;
        for edge in self.edges_from_kind(NodeType::DistributionCenter) {
            let linkage = self.linkage_for(&edge.source);
            let days: Vec<NaiveDate> = self.days_from(DC_START_OFFSET_DAYS).collect();
            for day in days {
                if rng.gen::<f64>() >= edge.shipments_per_week / 7.0 {
                    continue;
                }
                let ship_date = self.transit.random_business_hour(day, rng);
                let selection = self.select(
                    edge.source,
                    edge.product_category,
                    edge.volume_per_shipment,
                    ship_date,
                    linkage,
                );
                if selection.is_empty() {
                    continue;
                }
                let receive_date = ship_date + self.transit.transit_time(Leg::DcToRetail, edge.distance_miles, rng);
                let shipment = self.record_shipment(Shipment {
                    id: 0,
                    source: edge.source,
                    destination: edge.destination,
                    ship_date,
                    receive_date,
                    product_category: edge.product_category,
                    quantity: edge.volume_per_shipment,
                    source_tlcs: selection.actual.clone(),
                    dest_tlc: None,
                    tlc_probabilities: selection.probabilities,
                });
                count += 1;

                // Only physically shipped lots reach the shelf
                let per_lot = if selection.actual.is_empty() {
                    0.0
                } else {
                    edge.volume_per_shipment / selection.actual.len() as f64
                };
                let hold = self.transit.retail_stocking_delay_hours;
                for tlc in selection.actual {
                    self.add_to_inventory(
                        edge.destination,
                        tlc.clone(),
                        edge.product_category,
                        per_lot,
                        receive_date,
                        edge.source,
                        hold,
                    );
                    self.shipment_map.insert((edge.destination, tlc), shipment.clone());
                }
            }
        }
        count
    }
}
