use super::Exposure;
use crate::lineage::{ProductCategory, Tlc};
use crate::network::NodeId;
use chrono::{Duration, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Patients are interviewed this many days after being reported, at most
const MAX_INTERVIEW_DELAY_DAYS: i64 = 5;
const LOCATION_RECALL_RATE: f64 = 0.95;
const DEFAULT_PURCHASE_UNCERTAINTY_DAYS: i64 = 3;
const MAX_PURCHASE_UNCERTAINTY_DAYS: i64 = 7;

/// Illness characteristics of the outbreak pathogen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathogenProfile {
    pub name: String,
    /// Fraction of exposed consumers who become ill
    pub infection_rate: f64,
    pub incubation_days_min: i64,
    pub incubation_days_max: i64,
    pub reporting_delay_min: i64,
    pub reporting_delay_max: i64,
    pub hospitalization_rate: f64,
}

impl Default for PathogenProfile {
    fn default() -> Self {
        Self {
            name: "Salmonella".to_string(),
            infection_rate: 0.3,
            incubation_days_min: 1,
            incubation_days_max: 3,
            reporting_delay_min: 2,
            reporting_delay_max: 14,
            hospitalization_rate: 0.2,
        }
    }
}

/// A reported illness
///
/// Consumers of bulk produce do not know lot codes, so investigators only
/// see the interview fields. The exposure fields are ground truth kept for
/// scoring the investigation.
#[derive(Debug, Clone, Serialize)]
pub struct IllnessCase {
    pub id: usize,
    pub exposure_id: usize,
    pub exposure_date: NaiveDate,
    pub onset_date: NaiveDate,
    pub report_date: NaiveDate,
    pub pathogen: String,
    pub hospitalized: bool,

    pub was_interviewed: bool,
    pub interview_date: Option<NaiveDate>,
    pub reported_exposure_location_id: Option<NodeId>,
    pub reported_exposure_location_name: Option<String>,
    pub estimated_purchase_date: Option<NaiveDate>,
    pub purchase_date_uncertainty_days: i64,

    pub exposure_location_id: NodeId,
    pub exposure_location_name: String,
    pub exposure_product: ProductCategory,
    pub actual_contamination_source_tlc: Option<Tlc>,
}

impl IllnessCase {
    /// A bare case at `location`; no interview data
    pub fn new(id: usize, location: NodeId, exposure_date: NaiveDate) -> Self {
        Self {
            id,
            exposure_id: id,
            exposure_date,
            onset_date: exposure_date,
            report_date: exposure_date,
            pathogen: PathogenProfile::default().name,
            hospitalized: false,
            was_interviewed: false,
            interview_date: None,
            reported_exposure_location_id: None,
            reported_exposure_location_name: None,
            estimated_purchase_date: None,
            purchase_date_uncertainty_days: DEFAULT_PURCHASE_UNCERTAINTY_DAYS,
            exposure_location_id: location,
            exposure_location_name: String::new(),
            exposure_product: ProductCategory::FreshCucumbers,
            actual_contamination_source_tlc: None,
        }
    }

    /// Record a successful interview naming `location` and a purchase estimate
    pub fn interviewed(mut self, location: NodeId, purchase_date: NaiveDate, uncertainty_days: i64) -> Self {
        self.was_interviewed = true;
        self.reported_exposure_location_id = Some(location);
        self.estimated_purchase_date = Some(purchase_date);
        self.purchase_date_uncertainty_days = uncertainty_days;
        self
    }

    /// Whether the interview gave investigators a location and a date to work from
    pub fn has_usable_interview(&self) -> bool {
        self.was_interviewed
            && self.reported_exposure_location_id.is_some()
            && self.estimated_purchase_date.is_some()
    }
}

/// Turns exposures into reported, interviewed cases
#[derive(Debug, Clone)]
pub struct CaseGenerator {
    profile: PathogenProfile,
    interview_success_rate: f64,
}

impl CaseGenerator {
    pub fn new(profile: PathogenProfile, interview_success_rate: f64) -> Self {
        Self {
            profile,
            interview_success_rate,
        }
    }

    pub fn profile(&self) -> &PathogenProfile {
        &self.profile
    }

    pub fn generate<R: Rng + ?Sized>(&self, exposures: &[Exposure], rng: &mut R) -> Vec<IllnessCase> {
        let mut cases = Vec::new();
        for exposure in exposures.iter().filter(|e| e.was_exposed) {
            if rng.gen::<f64>() > self.profile.infection_rate {
                continue;
            }

            let exposure_date = exposure.exposure_date;
            let incubation = rng.gen_range(self.profile.incubation_days_min..=self.profile.incubation_days_max);
            let onset_date = exposure_date + Duration::days(incubation);
            let delay = rng.gen_range(self.profile.reporting_delay_min..=self.profile.reporting_delay_max);
            let report_date = onset_date + Duration::days(delay);

            let mut case = IllnessCase {
                id: cases.len(),
                exposure_id: exposure.id,
                exposure_date,
                onset_date,
                report_date,
                pathogen: self.profile.name.clone(),
                hospitalized: false,
                was_interviewed: rng.gen::<f64>() < self.interview_success_rate,
                interview_date: None,
                reported_exposure_location_id: None,
                reported_exposure_location_name: None,
                estimated_purchase_date: None,
                purchase_date_uncertainty_days: DEFAULT_PURCHASE_UNCERTAINTY_DAYS,
                exposure_location_id: exposure.location_id,
                exposure_location_name: exposure.location_name.clone(),
                exposure_product: exposure.product_category,
                actual_contamination_source_tlc: Some(exposure.tlc.clone()),
            };

            if case.was_interviewed {
                let interview_date = report_date + Duration::days(rng.gen_range(1..=MAX_INTERVIEW_DELAY_DAYS));
                if rng.gen::<f64>() < LOCATION_RECALL_RATE {
                    case.reported_exposure_location_id = Some(exposure.location_id);
                    case.reported_exposure_location_name = Some(exposure.location_name.clone());
                }
                // Recall drifts later the longer ago the purchase was
                let days_since = (interview_date - exposure_date).num_days();
                let recall_error = rng.gen_range(-3..=3) + days_since / 7;
                case.interview_date = Some(interview_date);
                case.estimated_purchase_date = Some(exposure_date + Duration::days(recall_error));
                case.purchase_date_uncertainty_days = MAX_PURCHASE_UNCERTAINTY_DAYS.min(2 + days_since / 5);
            }

            case.hospitalized = rng.gen::<f64>() < self.profile.hospitalization_rate;
            cases.push(case);
        }
        cases
    }
}

/// Descriptive statistics over generated cases
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaseSummary {
    pub total_cases: usize,
    pub hospitalized: usize,
    pub hospitalization_rate: f64,
    pub cases_interviewed: usize,
    pub cases_with_usable_info: usize,
    pub first_onset: Option<NaiveDate>,
    pub last_onset: Option<NaiveDate>,
    pub cucumber_cases: usize,
    pub salad_cases: usize,
    pub exposure_locations: usize,
}

impl CaseSummary {
    pub fn from_cases(cases: &[IllnessCase]) -> Self {
        if cases.is_empty() {
            return Self::default();
        }
        let hospitalized = cases.iter().filter(|c| c.hospitalized).count();
        let by_product = |p: ProductCategory| cases.iter().filter(|c| c.exposure_product == p).count();
        Self {
            total_cases: cases.len(),
            hospitalized,
            hospitalization_rate: hospitalized as f64 / cases.len() as f64,
            cases_interviewed: cases.iter().filter(|c| c.was_interviewed).count(),
            cases_with_usable_info: cases.iter().filter(|c| c.has_usable_interview()).count(),
            first_onset: cases.iter().map(|c| c.onset_date).min(),
            last_onset: cases.iter().map(|c| c.onset_date).max(),
            cucumber_cases: by_product(ProductCategory::FreshCucumbers),
            salad_cases: by_product(ProductCategory::CucumberSalad),
            exposure_locations: cases
                .iter()
                .map(|c| c.exposure_location_id)
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

/// Case counts per onset date, ascending
pub fn epi_curve(cases: &[IllnessCase]) -> Vec<(NaiveDate, usize)> {
    let mut counts = BTreeMap::new();
    for case in cases {
        *counts.entry(case.onset_date).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn exposure(id: usize, exposed: bool) -> Exposure {
        Exposure {
            id,
            location_id: NodeId::new(),
            location_name: "FreshMart #0001".into(),
            exposure_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            exposure_type: ExposureType::RetailPurchase,
            product_category: ProductCategory::FreshCucumbers,
            tlc: Tlc::from("LOT-1"),
            contamination_probability: 1.0,
            was_exposed: exposed,
        }
    }

    fn certain_illness() -> PathogenProfile {
        PathogenProfile {
            infection_rate: 1.0,
            ..PathogenProfile::default()
        }
    }

    #[test]
    fn unexposed_consumers_never_fall_ill() {
        let generator = CaseGenerator::new(certain_illness(), 1.0);
        let exposures: Vec<_> = (0..20).map(|i| exposure(i, false)).collect();
        assert!(generator.generate(&exposures, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn case_timeline_is_ordered() {
        let generator = CaseGenerator::new(certain_illness(), 1.0);
        let exposures: Vec<_> = (0..50).map(|i| exposure(i, true)).collect();
        let cases = generator.generate(&exposures, &mut StdRng::seed_from_u64(2));
        assert_eq!(cases.len(), 50);
        for case in &cases {
            let incubation = (case.onset_date - case.exposure_date).num_days();
            let delay = (case.report_date - case.onset_date).num_days();
            assert!((1..=3).contains(&incubation));
            assert!((2..=14).contains(&delay));
            let interview = case.interview_date.unwrap();
            assert!(interview > case.report_date);
            assert!((2..=7).contains(&case.purchase_date_uncertainty_days));
            assert_eq!(case.actual_contamination_source_tlc, Some(Tlc::from("LOT-1")));
        }
    }

    #[test]
    fn uninterviewed_cases_are_unusable() {
        let generator = CaseGenerator::new(certain_illness(), 0.0);
        let exposures: Vec<_> = (0..10).map(|i| exposure(i, true)).collect();
        let cases = generator.generate(&exposures, &mut StdRng::seed_from_u64(3));
        assert!(cases.iter().all(|c| !c.has_usable_interview()));
        let summary = CaseSummary::from_cases(&cases);
        assert_eq!(summary.cases_interviewed, 0);
        assert_eq!(summary.cucumber_cases, 10);
    }

    #[test]
    fn builder_interview_is_usable() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let location = NodeId::new();
        assert!(!IllnessCase::new(0, location, day).has_usable_interview());
        assert!(IllnessCase::new(0, location, day)
            .interviewed(location, day, 3)
            .has_usable_interview());
    }

    #[test]
    fn epi_curve_counts_by_onset() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut a = IllnessCase::new(0, NodeId::new(), day);
        a.onset_date = day;
        let mut b = a.clone();
        b.id = 1;
        let mut c = a.clone();
        c.onset_date = day + Duration::days(2);
        let curve = epi_curve(&[c, a, b]);
        assert_eq!(curve, vec![(day, 2), (day + Duration::days(2), 1)]);
    }
}
