//! Consumer exposures at retail locations and the illness cases they produce

mod cases;

pub use cases::{epi_curve, CaseGenerator, CaseSummary, IllnessCase, PathogenProfile};

use crate::flow::NodeInventory;
use crate::lineage::{ProductCategory, Tlc};
use crate::network::{NodeId, NodeKind, SupplyChainNetwork};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureType {
    /// Bought whole product at the store
    RetailPurchase,
    /// Ate salad at the store's deli
    DeliConsumption,
}

/// One consumer's contact with a lot at a location
#[derive(Debug, Clone, Serialize)]
pub struct Exposure {
    pub id: usize,
    pub location_id: NodeId,
    pub location_name: String,
    pub exposure_date: NaiveDate,
    pub exposure_type: ExposureType,
    pub product_category: ProductCategory,
    pub tlc: Tlc,
    pub contamination_probability: f64,
    /// Whether the consumer actually ingested contaminated product
    pub was_exposed: bool,
}

/// Shopper behaviour at retail locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureParams {
    /// Mean daily customers; each day draws from `[n/2, 2n]`
    pub daily_customers_per_retailer: u32,
    pub cucumber_purchase_rate: f64,
    pub deli_consumption_rate: f64,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            daily_customers_per_retailer: 50,
            cucumber_purchase_rate: 0.15,
            deli_consumption_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExposureSummary {
    pub total_exposures: usize,
    pub actually_exposed: usize,
    pub retail_purchases: usize,
    pub deli_consumptions: usize,
}

impl ExposureSummary {
    pub fn from_exposures(exposures: &[Exposure]) -> Self {
        let count = |t: ExposureType| exposures.iter().filter(|e| e.exposure_type == t).count();
        Self {
            total_exposures: exposures.len(),
            actually_exposed: exposures.iter().filter(|e| e.was_exposed).count(),
            retail_purchases: count(ExposureType::RetailPurchase),
            deli_consumptions: count(ExposureType::DeliConsumption),
        }
    }
}

/// Samples shoppers day by day over the retail network
///
/// Retail inventory holds the lots actually received, so exposure uses
/// ground truth. Hub record uncertainty only matters to the investigation.
pub struct ExposureGenerator<'a> {
    network: &'a SupplyChainNetwork,
    inventory: &'a NodeInventory,
    propagation: &'a BTreeMap<Tlc, f64>,
    params: ExposureParams,
}

impl<'a> ExposureGenerator<'a> {
    pub fn new(
        network: &'a SupplyChainNetwork,
        inventory: &'a NodeInventory,
        propagation: &'a BTreeMap<Tlc, f64>,
        params: ExposureParams,
    ) -> Self {
        Self {
            network,
            inventory,
            propagation,
            params,
        }
    }

    /// Exposures for every day in `start..=end`
    pub fn generate<R: Rng + ?Sized>(&self, start: NaiveDate, end: NaiveDate, rng: &mut R) -> Vec<Exposure> {
        let mut exposures = Vec::new();
        let n = self.params.daily_customers_per_retailer;

        for day in start.iter_days().take_while(|d| *d <= end) {
            for retailer_id in self.network.retailer_ids() {
                let Some(retailer) = self.network.get_node(retailer_id) else {
                    continue;
                };
                let shelf = self.stocked(retailer_id, day, None);
                if shelf.is_empty() {
                    continue;
                }

                let customers = rng.gen_range(n / 2..=n * 2);
                for _ in 0..customers {
                    if rng.gen::<f64>() < self.params.cucumber_purchase_rate {
                        if let Some(tlc) = shelf.choose(rng) {
                            let exposure = self.expose(
                                exposures.len(),
                                *retailer_id,
                                retailer.display_name(),
                                day,
                                ExposureType::RetailPurchase,
                                ProductCategory::FreshCucumbers,
                                tlc,
                                rng,
                            );
                            exposures.push(exposure);
                        }
                    }
                }

                let NodeKind::Retailer { deli: Some(deli_id), .. } = &retailer.kind else {
                    continue;
                };
                let counter = self.stocked(deli_id, day, Some(ProductCategory::CucumberSalad));
                let deli_name = self.network.node_name(deli_id);
                for _ in 0..customers {
                    if rng.gen::<f64>() < self.params.deli_consumption_rate {
                        if let Some(tlc) = counter.choose(rng) {
                            let exposure = self.expose(
                                exposures.len(),
                                *deli_id,
                                deli_name.clone(),
                                day,
                                ExposureType::DeliConsumption,
                                ProductCategory::CucumberSalad,
                                tlc,
                                rng,
                            );
                            exposures.push(exposure);
                        }
                    }
                }
            }
        }

        debug!(
            exposures = exposures.len(),
            exposed = exposures.iter().filter(|e| e.was_exposed).count(),
            "exposures generated"
        );
        exposures
    }

    /// TLCs received at `node` on or before `day`
    fn stocked(&self, node: &NodeId, day: NaiveDate, category: Option<ProductCategory>) -> Vec<Tlc> {
        self.inventory
            .get(node)
            .into_iter()
            .flatten()
            .filter(|r| r.received_date.date() <= day)
            .filter(|r| category.map_or(true, |c| r.product_category == c))
            .map(|r| r.tlc.clone())
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn expose<R: Rng + ?Sized>(
        &self,
        id: usize,
        location_id: NodeId,
        location_name: String,
        day: NaiveDate,
        exposure_type: ExposureType,
        product_category: ProductCategory,
        tlc: &Tlc,
        rng: &mut R,
    ) -> Exposure {
        let probability = self.propagation.get(tlc).copied().unwrap_or(0.0);
        Exposure {
            id,
            location_id,
            location_name,
            exposure_date: day,
            exposure_type,
            product_category,
            tlc: tlc.clone(),
            contamination_probability: probability,
            was_exposed: rng.gen::<f64>() < probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::InventoryRecord;
    use crate::network::Location;
    use crate::network::Node;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn store(network: &mut SupplyChainNetwork) -> NodeId {
        let id = NodeId::new();
        network.add_node(Node::new(
            id,
            Location::default(),
            NodeKind::Retailer {
                store_name: "FreshMart".into(),
                store_number: "0001".into(),
                deli: None,
            },
        ))
    }

    fn stock(inventory: &mut NodeInventory, node: NodeId, tlc: &str, received: NaiveDate) {
        inventory.entry(node).or_default().push(InventoryRecord {
            tlc: Tlc::from(tlc),
            product_category: ProductCategory::FreshCucumbers,
            quantity_received: 100.0,
            quantity_remaining: 100.0,
            received_date: received.and_hms_opt(9, 0, 0).unwrap(),
            available_date: received.and_hms_opt(13, 0, 0).unwrap(),
            source_node: NodeId::new(),
        });
    }

    #[test]
    fn empty_shelves_produce_no_exposures() {
        let mut network = SupplyChainNetwork::new();
        store(&mut network);
        let inventory = NodeInventory::new();
        let propagation = BTreeMap::new();
        let generator = ExposureGenerator::new(&network, &inventory, &propagation, ExposureParams::default());
        let exposures = generator.generate(day(1), day(7), &mut StdRng::seed_from_u64(1));
        assert!(exposures.is_empty());
    }

    #[test]
    fn certain_contamination_always_exposes() {
        let mut network = SupplyChainNetwork::new();
        let retailer = store(&mut network);
        let mut inventory = NodeInventory::new();
        stock(&mut inventory, retailer, "LOT-A", day(1));
        let propagation = BTreeMap::from([(Tlc::from("LOT-A"), 1.0)]);
        let params = ExposureParams {
            cucumber_purchase_rate: 1.0,
            ..ExposureParams::default()
        };
        let generator = ExposureGenerator::new(&network, &inventory, &propagation, params);
        let exposures = generator.generate(day(1), day(3), &mut StdRng::seed_from_u64(2));
        assert!(!exposures.is_empty());
        assert!(exposures.iter().all(|e| e.was_exposed && e.location_id == retailer));
        assert!(exposures.iter().all(|e| e.location_name == "FreshMart #0001"));
    }

    #[test]
    fn lots_are_not_sold_before_receipt() {
        let mut network = SupplyChainNetwork::new();
        let retailer = store(&mut network);
        let mut inventory = NodeInventory::new();
        stock(&mut inventory, retailer, "LATE", day(5));
        let propagation = BTreeMap::new();
        let generator = ExposureGenerator::new(&network, &inventory, &propagation, ExposureParams::default());
        let exposures = generator.generate(day(1), day(6), &mut StdRng::seed_from_u64(3));
        assert!(!exposures.is_empty());
        assert!(exposures.iter().all(|e| e.exposure_date >= day(5)));
        assert!(exposures.iter().all(|e| !e.was_exposed));

        let summary = ExposureSummary::from_exposures(&exposures);
        assert_eq!(summary.retail_purchases, exposures.len());
        assert_eq!(summary.actually_exposed, 0);
    }
}
