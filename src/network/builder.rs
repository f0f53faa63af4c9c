//! Randomized construction of a cucumber supply-chain network

use super::node::{generate_gln, AssignmentMode, CalculatedMethod, Location, Node, NodeId, NodeKind};
use super::SupplyChainNetwork;
use crate::lineage::ProductCategory;
use crate::transit::city_coordinates;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FARM_LOCATIONS: &[(&str, &str)] = &[
    ("Salinas", "CA"),
    ("Oxnard", "CA"),
    ("Imperial Valley", "CA"),
    ("Bakersfield", "CA"),
    ("Fresno", "CA"),
    ("Stockton", "CA"),
    ("Watsonville", "CA"),
    ("Gilroy", "CA"),
    ("Coachella", "CA"),
    ("Santa Maria", "CA"),
    ("Hollister", "CA"),
    ("Modesto", "CA"),
    ("Yuma", "AZ"),
    ("Nogales", "AZ"),
    ("Willcox", "AZ"),
    ("Buckeye", "AZ"),
    ("Immokalee", "FL"),
    ("Homestead", "FL"),
    ("Tifton", "GA"),
    ("Moultrie", "GA"),
];

const PACKER_LOCATIONS: &[(&str, &str)] = &[
    ("Salinas", "CA"),
    ("Yuma", "AZ"),
    ("Nogales", "AZ"),
    ("Oxnard", "CA"),
    ("Phoenix", "AZ"),
];

const DC_LOCATIONS: &[(&str, &str)] = &[
    ("Phoenix", "AZ"),
    ("Los Angeles", "CA"),
    ("Denver", "CO"),
    ("Dallas", "TX"),
    ("Chicago", "IL"),
    ("Atlanta", "GA"),
    ("Portland", "OR"),
    ("Seattle", "WA"),
];

const RETAIL_CITIES: &[(&str, &str)] = &[
    ("Phoenix", "AZ"),
    ("Tucson", "AZ"),
    ("Los Angeles", "CA"),
    ("San Diego", "CA"),
    ("San Francisco", "CA"),
    ("Denver", "CO"),
    ("Las Vegas", "NV"),
    ("Albuquerque", "NM"),
    ("Dallas", "TX"),
    ("Houston", "TX"),
    ("Austin", "TX"),
    ("Chicago", "IL"),
    ("Seattle", "WA"),
    ("Portland", "OR"),
    ("Salt Lake City", "UT"),
];

const COMPANY_PREFIX: &str = "001234567";

/// Network shape and hub tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub num_farms: usize,
    pub num_packers: usize,
    pub num_distribution_centers: usize,
    pub num_processors: usize,
    pub num_retailers: usize,
    /// Fraction of retailers with an in-store deli
    pub retailers_with_delis_pct: f64,
    pub dc_tracking_mode: AssignmentMode,
    pub dc_calculated_method: CalculatedMethod,
    pub dc_date_window_days: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_farms: 5,
            num_packers: 2,
            num_distribution_centers: 3,
            num_processors: 2,
            num_retailers: 20,
            retailers_with_delis_pct: 0.3,
            dc_tracking_mode: AssignmentMode::Deterministic,
            dc_calculated_method: CalculatedMethod::FifoDateRange,
            dc_date_window_days: 7,
        }
    }
}

/// Builds a [`SupplyChainNetwork`] from a config and a caller-owned RNG
pub struct NetworkBuilder {
    config: NetworkConfig,
    network: SupplyChainNetwork,
}

impl NetworkBuilder {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            network: SupplyChainNetwork::new(),
        }
    }

    /// Build farms, packers, DCs, processors, retailers and delis, then edges
    pub fn build<R: Rng + ?Sized>(mut self, rng: &mut R) -> SupplyChainNetwork {
        self.build_farms(rng);
        self.build_packers(rng);
        self.build_distribution_centers(rng);
        self.build_processors(rng);
        self.build_retailers(rng);
        self.build_edges(rng);
        debug!(summary = ?self.network.summary(), "built supply chain network");
        self.network
    }

    fn location<R: Rng + ?Sized>(&self, name: String, city: &str, state: &str, rng: &mut R) -> Location {
        let coords = city_coordinates(city, state);
        Location {
            name,
            city: city.to_string(),
            state: state.to_string(),
            gln: generate_gln(COMPANY_PREFIX, rng),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
        }
    }

    fn sample<R: Rng + ?Sized>(pool: &[(&'static str, &'static str)], n: usize, rng: &mut R) -> Vec<(&'static str, &'static str)> {
        pool.choose_multiple(rng, n.min(pool.len())).copied().collect()
    }

    fn build_farms<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (i, (city, state)) in Self::sample(FARM_LOCATIONS, self.config.num_farms, rng)
            .into_iter()
            .enumerate()
        {
            let farm_name = format!("{city} Cucumber Farm {}", i + 1);
            let id = NodeId::from_rng(rng);
            let location = self.location(farm_name.clone(), city, state, rng);
            let area_count = rng.gen_range(2..=4u8);
            let growing_areas = (0..area_count)
                .map(|j| format!("FIELD_{}", char::from(b'A' + j)))
                .collect();
            self.network.add_node(Node::new(
                id,
                location,
                NodeKind::Farm {
                    farm_name,
                    growing_areas,
                },
            ));
        }
    }

    fn build_packers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (i, (city, state)) in Self::sample(PACKER_LOCATIONS, self.config.num_packers, rng)
            .into_iter()
            .enumerate()
        {
            let facility_name = format!("{city} Packing Co {}", i + 1);
            let id = NodeId::from_rng(rng);
            let location = self.location(facility_name.clone(), city, state, rng);
            self.network.add_node(Node::new(
                id,
                location,
                NodeKind::Packer {
                    facility_name,
                    maintains_source_tlc: true,
                },
            ));
        }
    }

    fn build_distribution_centers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let calculated = self.config.dc_tracking_mode == AssignmentMode::Calculated;
        for (city, state) in Self::sample(DC_LOCATIONS, self.config.num_distribution_centers, rng) {
            let facility_name = format!("{city} Distribution Center");
            let id = NodeId::from_rng(rng);
            let location = self.location(facility_name.clone(), city, state, rng);
            self.network.add_node(Node::new(
                id,
                location,
                NodeKind::DistributionCenter {
                    facility_name,
                    assignment_mode: self.config.dc_tracking_mode,
                    calculated_method: calculated.then_some(self.config.dc_calculated_method),
                    date_window_days: self.config.dc_date_window_days,
                },
            ));
        }
    }

    fn build_processors<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for _ in 0..self.config.num_processors {
            let Some(&(city, state)) = DC_LOCATIONS.choose(rng) else {
                continue;
            };
            let facility_name = format!("Fresh Salads Inc - {city}");
            let id = NodeId::from_rng(rng);
            let location = self.location(facility_name.clone(), city, state, rng);
            self.network.add_node(Node::new(
                id,
                location,
                NodeKind::Processor {
                    facility_name,
                    lot_code_prefix: "SAL".to_string(),
                },
            ));
        }
    }

    fn build_retailers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for _ in 0..self.config.num_retailers {
            let Some(&(city, state)) = RETAIL_CITIES.choose(rng) else {
                continue;
            };
            let store_name = "FreshMart".to_string();
            let store_number = rng.gen_range(100..=999).to_string();
            let retailer_id = NodeId::from_rng(rng);
            let location = self.location(format!("{store_name} #{store_number}"), city, state, rng);

            let deli = if rng.gen::<f64>() < self.config.retailers_with_delis_pct {
                let deli_id = NodeId::from_rng(rng);
                self.network.add_node(Node::new(
                    deli_id,
                    location.clone(),
                    NodeKind::Deli {
                        facility_name: format!("{store_name} #{store_number} Deli"),
                        parent_retailer: Some(retailer_id),
                        lot_code_prefix: "DELI".to_string(),
                    },
                ));
                Some(deli_id)
            } else {
                None
            };

            self.network.add_node(Node::new(
                retailer_id,
                location,
                NodeKind::Retailer {
                    store_name,
                    store_number,
                    deli,
                },
            ));
        }
    }

    fn build_edges<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let farms = self.network.farm_ids().to_vec();
        let packers = self.network.packer_ids().to_vec();
        let dcs = self.network.distribution_center_ids().to_vec();
        let processors = self.network.processor_ids().to_vec();
        let retailers = self.network.retailer_ids().to_vec();
        let delis = self.network.deli_ids().to_vec();
        let fresh = ProductCategory::FreshCucumbers;
        let salad = ProductCategory::CucumberSalad;

        for farm in &farms {
            for packer in pick(&packers, rng.gen_range(1..=2), rng) {
                let volume = rng.gen_range(5000..=15000) as f64;
                let per_week = rng.gen_range(2.0..=5.0);
                self.network.add_edge(*farm, packer, fresh, volume, per_week);
            }
        }

        for processor in &processors {
            for packer in pick(&packers, rng.gen_range(1..=2), rng) {
                let volume = rng.gen_range(500..=2000) as f64;
                let per_week = rng.gen_range(3.0..=5.0);
                self.network.add_edge(packer, *processor, fresh, volume, per_week);
            }
        }

        for packer in &packers {
            for dc in pick(&dcs, rng.gen_range(2..=4), rng) {
                let volume = rng.gen_range(2000..=8000) as f64;
                let per_week = rng.gen_range(3.0..=7.0);
                self.network.add_edge(*packer, dc, fresh, volume, per_week);
            }
        }

        for processor in &processors {
            for dc in pick(&dcs, rng.gen_range(1..=3), rng) {
                let volume = rng.gen_range(300..=1000) as f64;
                let per_week = rng.gen_range(3.0..=5.0);
                self.network.add_edge(*processor, dc, salad, volume, per_week);
            }
        }

        // Each DC serves a contiguous slice of retailers, with some overlap
        if !dcs.is_empty() {
            let per_dc = (retailers.len() / dcs.len()).max(1);
            for (i, dc) in dcs.iter().enumerate() {
                let start = (i * per_dc).min(retailers.len());
                let end = (start + per_dc + rng.gen_range(0..=3)).min(retailers.len());
                for retailer in &retailers[start..end] {
                    let volume = rng.gen_range(100..=500) as f64;
                    let per_week = rng.gen_range(2.0..=4.0);
                    self.network.add_edge(*dc, *retailer, fresh, volume, per_week);
                }
            }
        }

        for deli in &delis {
            for dc in pick(&dcs, rng.gen_range(1..=2), rng) {
                let volume = rng.gen_range(20..=100) as f64;
                let per_week = rng.gen_range(2.0..=3.0);
                self.network.add_edge(dc, *deli, salad, volume, per_week);
            }
        }
    }
}

fn pick<R: Rng + ?Sized>(pool: &[NodeId], n: usize, rng: &mut R) -> Vec<NodeId> {
    pool.choose_multiple(rng, n.min(pool.len())).copied().collect()
}
