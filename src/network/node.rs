//! Supply-chain nodes

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a supply-chain node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a NodeId drawn from a seeded generator, so identical seeds give identical IDs
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// First eight hex digits, upper-cased, used as a lot-code prefix
    pub fn short_prefix(&self) -> String {
        self.0.simple().to_string()[..8].to_uppercase()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical location; the GLN doubles as the traceability lot code source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub city: String,
    pub state: String,
    pub gln: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// How a distribution center links outbound shipments to inbound lots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Exact lot codes on every outbound shipment
    #[default]
    Deterministic,
    /// Lot codes approximated from inventory records
    Calculated,
}

/// Approximation used by a distribution center in calculated mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatedMethod {
    /// Older lots weigh more
    #[default]
    #[serde(alias = "fifo", alias = "FIFO", alias = "FIFO_DATE_RANGE")]
    FifoDateRange,
    /// Newer lots weigh more
    #[serde(alias = "lifo", alias = "LIFO", alias = "LIFO_DATE_RANGE")]
    LifoDateRange,
    /// Every lot in the window is equally possible
    #[serde(alias = "ALL_IN_WINDOW")]
    AllInWindow,
    /// Weighted by remaining quantity
    #[serde(alias = "INVENTORY_WEIGHTED")]
    InventoryWeighted,
}

/// Node kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Farm,
    Packer,
    DistributionCenter,
    Processor,
    Deli,
    Retailer,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Farm => "farm",
            NodeType::Packer => "packer",
            NodeType::DistributionCenter => "distribution_center",
            NodeType::Processor => "processor",
            NodeType::Deli => "deli",
            NodeType::Retailer => "retailer",
        }
    }
}

/// Kind-specific node payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Farm {
        farm_name: String,
        growing_areas: Vec<String>,
    },
    Packer {
        facility_name: String,
        /// Farm TLCs pass through packing unchanged
        maintains_source_tlc: bool,
    },
    DistributionCenter {
        facility_name: String,
        assignment_mode: AssignmentMode,
        calculated_method: Option<CalculatedMethod>,
        date_window_days: u32,
    },
    Processor {
        facility_name: String,
        lot_code_prefix: String,
    },
    Deli {
        facility_name: String,
        parent_retailer: Option<NodeId>,
        lot_code_prefix: String,
    },
    Retailer {
        store_name: String,
        store_number: String,
        deli: Option<NodeId>,
    },
}

/// A supply-chain participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub location: Location,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, location: Location, kind: NodeKind) -> Self {
        Self { id, location, kind }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Farm { .. } => NodeType::Farm,
            NodeKind::Packer { .. } => NodeType::Packer,
            NodeKind::DistributionCenter { .. } => NodeType::DistributionCenter,
            NodeKind::Processor { .. } => NodeType::Processor,
            NodeKind::Deli { .. } => NodeType::Deli,
            NodeKind::Retailer { .. } => NodeType::Retailer,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.kind {
            NodeKind::Farm { farm_name, .. } => farm_name.clone(),
            NodeKind::Packer { facility_name, .. }
            | NodeKind::DistributionCenter { facility_name, .. }
            | NodeKind::Processor { facility_name, .. }
            | NodeKind::Deli { facility_name, .. } => facility_name.clone(),
            NodeKind::Retailer {
                store_name,
                store_number,
                ..
            } => format!("{store_name} #{store_number}"),
        }
    }

    pub fn is_farm(&self) -> bool {
        matches!(self.kind, NodeKind::Farm { .. })
    }

    /// Whether outbound lot codes are approximated rather than recorded
    pub fn uses_calculated_lots(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::DistributionCenter {
                assignment_mode: AssignmentMode::Calculated,
                ..
            }
        )
    }

    /// Farm harvest lot code: `PREFIX-YYYYMMDD-AREA`
    pub fn farm_lot_code(&self, harvest_date: chrono::NaiveDate, growing_area: &str) -> String {
        format!(
            "{}-{}-{}",
            self.id.short_prefix(),
            harvest_date.format("%Y%m%d"),
            growing_area
        )
    }

    /// Transformation lot code: `PREFIX-YYYYMMDD-RECIPE-NNNNN`
    ///
    /// The trailing number is a stable hash of the sorted input TLCs.
    pub fn transformation_lot_code(
        &self,
        date: chrono::NaiveDate,
        recipe_id: &str,
        input_tlcs: &[String],
    ) -> String {
        let prefix = match &self.kind {
            NodeKind::Processor { lot_code_prefix, .. } | NodeKind::Deli { lot_code_prefix, .. } => {
                lot_code_prefix.as_str()
            }
            _ => "TRN",
        };
        let mut sorted: Vec<&str> = input_tlcs.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        // FNV-1a over the joined codes
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in sorted.join("|").bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        format!(
            "{}-{}-{}-{:05}",
            prefix,
            date.format("%Y%m%d"),
            recipe_id,
            hash % 100_000
        )
    }
}

/// Generate a 13-digit GS1 Global Location Number with a valid check digit
pub fn generate_gln<R: Rng + ?Sized>(company_prefix: &str, rng: &mut R) -> String {
    let mut prefix: String = company_prefix.chars().take(9).collect();
    while prefix.len() < 9 {
        prefix.push('0');
    }
    let digits_12 = format!("{}{:03}", prefix, rng.gen_range(0..=999));
    format!("{}{}", digits_12, gs1_check_digit(&digits_12))
}

/// GS1 check digit: weights 3,1 alternating from the leftmost digit
pub fn gs1_check_digit(digits: &str) -> u32 {
    let total: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { d })
        .sum();
    (10 - total % 10) % 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn location() -> Location {
        Location {
            name: "Yuma Farm".into(),
            city: "Yuma".into(),
            state: "AZ".into(),
            gln: "0012345670005".into(),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn seeded_ids_are_reproducible() {
        let a = NodeId::from_rng(&mut StdRng::seed_from_u64(9));
        let b = NodeId::from_rng(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn gln_has_thirteen_digits_and_valid_check() {
        let mut rng = StdRng::seed_from_u64(1);
        let gln = generate_gln("001234567", &mut rng);
        assert_eq!(gln.len(), 13);
        assert!(gln.starts_with("001234567"));
        let check = gln[12..].parse::<u32>().unwrap();
        assert_eq!(check, gs1_check_digit(&gln[..12]));
    }

    #[test]
    fn known_check_digit() {
        // 629104150021 -> 3
        assert_eq!(gs1_check_digit("629104150021"), 3);
    }

    #[test]
    fn retailer_display_name_includes_store_number() {
        let node = Node::new(
            NodeId::new(),
            location(),
            NodeKind::Retailer {
                store_name: "FreshMart".into(),
                store_number: "412".into(),
                deli: None,
            },
        );
        assert_eq!(node.display_name(), "FreshMart #412");
        assert_eq!(node.node_type(), NodeType::Retailer);
    }

    #[test]
    fn farm_lot_code_format() {
        let node = Node::new(
            NodeId::new(),
            location(),
            NodeKind::Farm {
                farm_name: "Yuma Cucumber Farm 1".into(),
                growing_areas: vec!["FIELD_A".into()],
            },
        );
        let code = node.farm_lot_code(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "FIELD_A");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1], "20240601");
        assert_eq!(parts[2], "FIELD_A");
    }

    #[test]
    fn transformation_code_ignores_input_order() {
        let node = Node::new(
            NodeId::new(),
            location(),
            NodeKind::Processor {
                facility_name: "Fresh Salads Inc - Dallas".into(),
                lot_code_prefix: "SAL".into(),
            },
        );
        let day = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let a = node.transformation_lot_code(day, "SALAD", &["B".into(), "A".into()]);
        let b = node.transformation_lot_code(day, "SALAD", &["A".into(), "B".into()]);
        assert_eq!(a, b);
        assert!(a.starts_with("SAL-20240605-SALAD-"));
    }

    #[test]
    fn calculated_method_accepts_short_names() {
        let method: CalculatedMethod = serde_json::from_str("\"fifo\"").unwrap();
        assert_eq!(method, CalculatedMethod::FifoDateRange);
        let method: CalculatedMethod = serde_json::from_str("\"INVENTORY_WEIGHTED\"").unwrap();
        assert_eq!(method, CalculatedMethod::InventoryWeighted);
        assert_eq!(serde_json::to_string(&CalculatedMethod::LifoDateRange).unwrap(), "\"lifo_date_range\"");
        assert!(serde_json::from_str::<CalculatedMethod>("\"random\"").is_err());
    }
}
