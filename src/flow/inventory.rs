//! Per-node inventory and lot selection for outbound shipments

use crate::lineage::{ProductCategory, Tlc};
use crate::network::{CalculatedMethod, NodeId};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A lot held at a node
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRecord {
    pub tlc: Tlc,
    pub product_category: ProductCategory,
    pub quantity_received: f64,
    pub quantity_remaining: f64,
    pub received_date: NaiveDateTime,
    /// When the lot clears any hold and can ship
    pub available_date: NaiveDateTime,
    pub source_node: NodeId,
}

/// Inventory records per node, in receipt order
pub type NodeInventory = HashMap<NodeId, Vec<InventoryRecord>>;

/// Lots chosen for one outbound movement
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Lots physically shipped
    pub actual: Vec<Tlc>,
    /// Lots the hub's records consider possible, with weights; empty when tracked exactly
    pub probabilities: BTreeMap<Tlc, f64>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.actual.is_empty() && self.probabilities.is_empty()
    }
}

/// Take quantity from the oldest available lots first
///
/// Returns the TLCs drawn from, in the order consumed.
pub fn take_fifo(records: &mut [&mut InventoryRecord], quantity_needed: f64) -> Vec<Tlc> {
    records.sort_by_key(|r| r.available_date);
    let mut taken = Vec::new();
    let mut remaining = quantity_needed;
    for record in records.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let take = remaining.min(record.quantity_remaining);
        record.quantity_remaining -= take;
        remaining -= take;
        taken.push(record.tlc.clone());
    }
    taken
}

/// Weights a calculated-mode hub assigns to candidate lots
///
/// Zero totals fall back to a uniform distribution over the candidates.
pub fn calculated_weights(
    method: CalculatedMethod,
    candidates: &[&InventoryRecord],
    ship_date: NaiveDateTime,
) -> Vec<f64> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let uniform = || vec![1.0 / candidates.len() as f64; candidates.len()];
    let normalize = |raw: Vec<f64>| -> Vec<f64> {
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.into_iter().map(|w| w / total).collect()
        } else {
            uniform()
        }
    };
    let age = |r: &InventoryRecord| (ship_date - r.available_date).num_seconds().max(0) as f64;

    match method {
        CalculatedMethod::AllInWindow => vec![1.0; candidates.len()],
        CalculatedMethod::FifoDateRange => normalize(candidates.iter().map(|&r| age(r)).collect()),
        CalculatedMethod::InventoryWeighted => {
            normalize(candidates.iter().map(|r| r.quantity_remaining).collect())
        }
        CalculatedMethod::LifoDateRange => {
            let ages: Vec<f64> = candidates.iter().map(|&r| age(r)).collect();
            let max_age = ages.iter().cloned().fold(0.0, f64::max);
            normalize(ages.into_iter().map(|a| max_age - a + 1.0).collect())
        }
    }
}

/// Whether a lot available at `available_at` falls in the lookback window ending at `ship_date`
pub fn in_window(available_at: NaiveDateTime, ship_date: NaiveDateTime, window_days: u32) -> bool {
    let window_start = ship_date - Duration::days(i64::from(window_days));
    available_at >= window_start && available_at <= ship_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(tlc: &str, available: NaiveDateTime, qty: f64) -> InventoryRecord {
        InventoryRecord {
            tlc: Tlc::from(tlc),
            product_category: ProductCategory::FreshCucumbers,
            quantity_received: qty,
            quantity_remaining: qty,
            received_date: available,
            available_date: available,
            source_node: NodeId::new(),
        }
    }

    #[test]
    fn fifo_consumes_oldest_first() {
        let mut a = record("NEW", at(5, 8), 100.0);
        let mut b = record("OLD", at(2, 8), 100.0);
        let mut refs = vec![&mut a, &mut b];
        let taken = take_fifo(&mut refs, 150.0);
        assert_eq!(taken, vec![Tlc::from("OLD"), Tlc::from("NEW")]);
        assert_eq!(b.quantity_remaining, 0.0);
        assert_eq!(a.quantity_remaining, 50.0);
    }

    #[test]
    fn fifo_weights_favor_older_lots() {
        let old = record("OLD", at(1, 8), 10.0);
        let new = record("NEW", at(4, 8), 10.0);
        let w = calculated_weights(CalculatedMethod::FifoDateRange, &[&old, &new], at(5, 8));
        assert!(w[0] > w[1]);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lifo_weights_favor_newer_lots() {
        let old = record("OLD", at(1, 8), 10.0);
        let new = record("NEW", at(4, 8), 10.0);
        let w = calculated_weights(CalculatedMethod::LifoDateRange, &[&old, &new], at(5, 8));
        assert!(w[1] > w[0]);
    }

    #[test]
    fn zero_quantity_falls_back_to_uniform() {
        let a = record("A", at(1, 8), 0.0);
        let b = record("B", at(2, 8), 0.0);
        let w = calculated_weights(CalculatedMethod::InventoryWeighted, &[&a, &b], at(5, 8));
        assert_eq!(w, vec![0.5, 0.5]);
    }

    #[test]
    fn zero_age_falls_back_to_uniform() {
        let a = record("A", at(5, 8), 10.0);
        let w = calculated_weights(CalculatedMethod::FifoDateRange, &[&a], at(5, 8));
        assert_eq!(w, vec![1.0]);
    }

    #[test]
    fn all_in_window_is_unweighted() {
        let a = record("A", at(1, 8), 10.0);
        let b = record("B", at(2, 8), 30.0);
        let w = calculated_weights(CalculatedMethod::AllInWindow, &[&a, &b], at(5, 8));
        assert_eq!(w, vec![1.0, 1.0]);
    }

    #[test]
    fn window_is_inclusive() {
        assert!(in_window(at(1, 8), at(8, 8), 7));
        assert!(!in_window(at(1, 7), at(8, 8), 7));
        assert!(!in_window(at(9, 8), at(8, 8), 7));
    }
}
