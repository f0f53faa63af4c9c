use super::{SimulationError, SimulationResult};
use crate::config::{check_at_least_one, check_rate, ConfigError, ConfigResult};
use crate::contamination::{ContaminationEvent, ContaminationSeeder, ContaminationSummary};
use crate::exposure::{CaseGenerator, CaseSummary, ExposureGenerator, ExposureParams, PathogenProfile};
use crate::flow::{FlowStats, ProductFlowSimulator};
use crate::investigation::{
    investigate_both_modes, rank_farms, IdentificationOutcome, InvestigationEngine, InvestigationTimingConfig,
    ModeComparison, RankedFarm, TraceRecords, DEFAULT_MIN_PROBABILITY, DEFAULT_RECORD_WINDOW_DAYS,
};
use crate::lineage::TrackingMode;
use crate::network::{AssignmentMode, NetworkBuilder, NetworkConfig, NodeId};
use crate::transit::TransitConfig;
use chrono::{Duration, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Parameters for one end-to-end run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// First simulated day; see [`default_start_date`] when unset
    pub start_date: Option<NaiveDate>,
    pub simulation_days: i64,
    pub network: NetworkConfig,
    pub transit: TransitConfig,
    /// Index into the farm registry, wrapped by the farm count
    pub contaminated_farm_index: usize,
    pub contamination_duration_days: i64,
    pub contamination_rate: f64,
    pub contamination_source: String,
    pub exposure: ExposureParams,
    pub pathogen: PathogenProfile,
    pub interview_success_rate: f64,
    pub record_collection_window_days: i64,
    pub timing: InvestigationTimingConfig,
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            simulation_days: 30,
            network: NetworkConfig::default(),
            transit: TransitConfig::default(),
            contaminated_farm_index: 0,
            contamination_duration_days: 7,
            contamination_rate: 1.0,
            contamination_source: "Irrigation water contamination".to_string(),
            exposure: ExposureParams::default(),
            pathogen: PathogenProfile::default(),
            interview_success_rate: 0.7,
            record_collection_window_days: DEFAULT_RECORD_WINDOW_DAYS,
            timing: InvestigationTimingConfig::default(),
            random_seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        check_rate("simulation.contamination_rate", self.contamination_rate)?;
        check_rate("simulation.interview_success_rate", self.interview_success_rate)?;
        check_rate("simulation.network.retailers_with_delis_pct", self.network.retailers_with_delis_pct)?;
        check_rate("simulation.exposure.cucumber_purchase_rate", self.exposure.cucumber_purchase_rate)?;
        check_rate("simulation.exposure.deli_consumption_rate", self.exposure.deli_consumption_rate)?;
        check_rate("simulation.pathogen.infection_rate", self.pathogen.infection_rate)?;
        check_rate("simulation.pathogen.hospitalization_rate", self.pathogen.hospitalization_rate)?;
        check_at_least_one("simulation.network.num_retailers", self.network.num_retailers)?;
        if self.simulation_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "simulation.simulation_days must not be negative, got {}",
                self.simulation_days
            )));
        }
        if self.contamination_duration_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "simulation.contamination_duration_days must not be negative, got {}",
                self.contamination_duration_days
            )));
        }
        if self.pathogen.incubation_days_min > self.pathogen.incubation_days_max
            || self.pathogen.reporting_delay_min > self.pathogen.reporting_delay_max
        {
            return Err(ConfigError::Invalid(
                "simulation.pathogen day ranges must have min <= max".to_string(),
            ));
        }
        Ok(())
    }

    /// Inclusive simulated date range
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .start_date
            .unwrap_or_else(|| default_start_date(self.random_seed.is_some(), self.simulation_days));
        (start, start + Duration::days(self.simulation_days))
    }
}

/// First simulated day of a seeded run with no configured start
pub fn seeded_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

/// Start day when none is configured
///
/// Seeded runs start on [`seeded_start_date`] so a seed reproduces the same
/// calendar. Unseeded runs end today.
pub fn default_start_date(seeded: bool, simulation_days: i64) -> NaiveDate {
    if seeded {
        seeded_start_date()
    } else {
        Local::now().date_naive() - Duration::days(simulation_days)
    }
}

/// Flat headline numbers for one run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    pub num_farms: usize,
    pub num_retailers: usize,
    pub num_delis: usize,
    pub lots_created: usize,
    pub shipments: usize,
    pub deterministic_links: usize,
    pub probabilistic_links: usize,
    pub source_farm_id: NodeId,
    pub source_farm_name: String,
    pub contaminated_source_tlcs: usize,
    pub contaminated_downstream_tlcs: usize,
    pub total_exposures: usize,
    pub actual_exposures: usize,
    pub total_cases: usize,
    pub cases_hospitalized: usize,
}

/// Plain-language verdict on the two investigations
#[derive(Debug, Clone, Serialize)]
pub struct Conclusion {
    pub deterministic_outcome: IdentificationOutcome,
    pub probabilistic_outcome: IdentificationOutcome,
    pub farm_scope_expansion: f64,
    pub tlc_scope_expansion: f64,
    pub summary: String,
}

impl Conclusion {
    pub fn from_comparison(comparison: &ModeComparison) -> Self {
        let det = comparison.deterministic.identification_outcome;
        let prob = comparison.probabilistic.identification_outcome;
        let farm = comparison.comparison.farm_scope_expansion;
        let tlc = comparison.comparison.tlc_scope_expansion;
        let note = accuracy_note(
            det,
            prob,
            comparison.probabilistic.top_two_margin,
            comparison.probabilistic.source_rank,
        );
        Self {
            deterministic_outcome: det,
            probabilistic_outcome: prob,
            farm_scope_expansion: farm,
            tlc_scope_expansion: tlc,
            summary: format!(
                "Comparing investigation outcomes for the SAME outbreak: With calculated lot codes at \
                 distribution centers, the investigation scope expanded by {farm:.1}x for farms and \
                 {tlc:.1}x for TLCs. {note}"
            ),
        }
    }
}

fn accuracy_note(
    det: IdentificationOutcome,
    prob: IdentificationOutcome,
    prob_margin: f64,
    prob_rank: usize,
) -> String {
    use IdentificationOutcome::{Inconclusive, No, Yes};
    match (det, prob) {
        (Yes, Yes) => "The correct source was conclusively identified in both investigation modes.".to_string(),
        (Yes, Inconclusive) => format!(
            "With full lot code compliance, the source was conclusively identified. With calculated \
             lot codes, the result was inconclusive (margin: {prob_margin:.3})."
        ),
        (Yes, No) => format!(
            "With full lot code compliance, the source was correctly identified. With calculated lot \
             codes, the wrong source was identified (actual source ranked #{prob_rank})."
        ),
        (Inconclusive, Yes) => "With full lot code compliance, the result was inconclusive. With calculated \
                                lot codes, the correct source was identified."
            .to_string(),
        (Inconclusive, Inconclusive) => {
            "Both investigation modes produced inconclusive results (top farms too close in score).".to_string()
        }
        (Inconclusive, No) => "With full lot code compliance, the result was inconclusive. With calculated \
                               lot codes, the wrong source was identified."
            .to_string(),
        (No, Yes) => {
            "Deterministic tracking identified the wrong source. Calculated lot codes correctly identified the \
             source."
                .to_string()
        }
        (No, Inconclusive) => "Deterministic tracking identified the wrong source. With calculated lot codes, \
                               the result was inconclusive."
            .to_string(),
        (No, No) => "Neither investigation mode correctly identified the source.".to_string(),
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub random_seed: Option<u64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub metrics: SimulationMetrics,
    pub flow: FlowStats,
    pub contamination: ContaminationSummary,
    pub cases: CaseSummary,
    pub comparison: ModeComparison,
    pub deterministic_ranking: Vec<RankedFarm>,
    pub probabilistic_ranking: Vec<RankedFarm>,
    /// Normalised probabilistic confidence by farm name
    pub farm_probabilities: BTreeMap<String, f64>,
    pub conclusion: Conclusion,
}

/// Runs one outbreak through both investigation modes
#[derive(Debug, Clone, Default)]
pub struct OutbreakSimulator {
    config: SimulationConfig,
}

impl OutbreakSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run once, seeded from the config or from entropy
    pub fn run_comparison(&self) -> SimulationResult<SimulationReport> {
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(&mut rng)
    }

    /// Run once drawing every random choice from `rng`
    ///
    /// Distribution centers always use calculated lot codes here so the
    /// same outbreak can be investigated with and without hub records.
    pub fn run_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulationResult<SimulationReport> {
        let config = &self.config;
        config.validate()?;
        let (start, end) = config.date_range();

        let network = NetworkBuilder::new(NetworkConfig {
            dc_tracking_mode: AssignmentMode::Calculated,
            ..config.network.clone()
        })
        .build(rng);
        let farm_ids = network.farm_ids();
        if farm_ids.is_empty() {
            return Err(SimulationError::EmptyNetwork);
        }
        let source_farm = farm_ids[config.contaminated_farm_index % farm_ids.len()];
        let source_farm_name = network.node_name(&source_farm);

        let mut flow = ProductFlowSimulator::new(&network, start, end, config.transit.clone())?.run(rng);

        let event = ContaminationEvent::new(
            source_farm,
            source_farm_name.clone(),
            start,
            start + Duration::days(config.contamination_duration_days),
            config.contamination_rate,
        )?
        .pathogen(config.pathogen.name.clone())
        .source(config.contamination_source.clone());
        let mut seeder = ContaminationSeeder::new();
        seeder.add_event(event);
        seeder.seed_contamination(&mut flow.graph, &flow.lot_metadata);
        seeder.propagate_contamination(&mut flow.graph);
        let propagation = seeder.propagation();

        let exposures = ExposureGenerator::new(&network, &flow.node_inventory, propagation, config.exposure.clone())
            .generate(start, end, rng);
        let cases = CaseGenerator::new(config.pathogen.clone(), config.interview_success_rate).generate(&exposures, rng);

        let records = TraceRecords::from_flow(&network, &flow);
        let investigations = investigate_both_modes(
            records,
            &cases,
            Some(source_farm),
            config.record_collection_window_days,
            &config.timing,
        );
        let farm_probabilities = InvestigationEngine::new(records, TrackingMode::Probabilistic)
            .record_window(config.record_collection_window_days)
            .farm_probability_distribution(&cases, DEFAULT_MIN_PROBABILITY);
        let comparison = investigations.summary();
        let conclusion = Conclusion::from_comparison(&comparison);

        let network_summary = network.summary();
        let case_summary = CaseSummary::from_cases(&cases);
        let metrics = SimulationMetrics {
            num_farms: network_summary.farms,
            num_retailers: network_summary.retailers,
            num_delis: network_summary.delis,
            lots_created: flow.stats.lots_created,
            shipments: flow.stats.total_shipments,
            deterministic_links: flow.stats.deterministic_links,
            probabilistic_links: flow.stats.probabilistic_links,
            source_farm_id: source_farm,
            source_farm_name,
            contaminated_source_tlcs: seeder.source_rates().len(),
            contaminated_downstream_tlcs: propagation.len(),
            total_exposures: exposures.len(),
            actual_exposures: exposures.iter().filter(|e| e.was_exposed).count(),
            total_cases: case_summary.total_cases,
            cases_hospitalized: case_summary.hospitalized,
        };

        info!(
            source = %metrics.source_farm_name,
            cases = metrics.total_cases,
            deterministic = %conclusion.deterministic_outcome,
            probabilistic = %conclusion.probabilistic_outcome,
            "outbreak simulation finished"
        );

        Ok(SimulationReport {
            random_seed: config.random_seed,
            start_date: start,
            end_date: end,
            metrics,
            flow: flow.stats.clone(),
            contamination: seeder.summary(),
            cases: case_summary,
            deterministic_ranking: rank_farms(&investigations.deterministic.convergence_results, Some(source_farm)),
            probabilistic_ranking: rank_farms(&investigations.probabilistic.convergence_results, Some(source_farm)),
            comparison,
            farm_probabilities,
            conclusion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            simulation_days: 14,
            network: NetworkConfig {
                num_farms: 3,
                num_retailers: 6,
                ..NetworkConfig::default()
            },
            random_seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn explicit_start_sets_inclusive_range() {
        let (start, end) = small_config(1).date_range();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    }

    #[test]
    fn seeded_run_without_start_uses_fixed_calendar() {
        let config = SimulationConfig {
            start_date: None,
            ..small_config(3)
        };
        let (start, end) = config.date_range();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn unseeded_run_ends_today() {
        let config = SimulationConfig {
            start_date: None,
            random_seed: None,
            ..small_config(3)
        };
        let (start, end) = config.date_range();
        assert_eq!(end - start, Duration::days(14));
        assert!(end >= Local::now().date_naive() - Duration::days(1));
    }

    #[test]
    fn invalid_rate_is_a_config_error() {
        let config = SimulationConfig {
            interview_success_rate: -0.1,
            ..small_config(1)
        };
        let err = OutbreakSimulator::new(config).run_comparison().unwrap_err();
        assert!(matches!(err, SimulationError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn network_without_farms_is_rejected() {
        let mut config = small_config(1);
        config.network.num_farms = 0;
        let err = OutbreakSimulator::new(config).run_comparison().unwrap_err();
        assert!(matches!(err, SimulationError::EmptyNetwork));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = OutbreakSimulator::new(small_config(42)).run_comparison().unwrap();
        let b = OutbreakSimulator::new(small_config(42)).run_comparison().unwrap();
        assert_eq!(a.metrics.source_farm_name, b.metrics.source_farm_name);
        assert_eq!(a.metrics.total_cases, b.metrics.total_cases);
        assert_eq!(a.metrics.lots_created, b.metrics.lots_created);
        assert_eq!(a.farm_probabilities, b.farm_probabilities);
        assert_eq!(a.conclusion.summary, b.conclusion.summary);
    }

    #[test]
    fn report_describes_the_configured_outbreak() {
        let report = OutbreakSimulator::new(small_config(7)).run_comparison().unwrap();
        assert_eq!(report.metrics.num_farms, 3);
        assert_eq!(report.metrics.num_retailers, 6);
        assert_eq!(report.contamination.num_contamination_events, 1);
        assert!(report.metrics.contaminated_source_tlcs > 0);
        assert!(report.metrics.contaminated_downstream_tlcs >= report.metrics.contaminated_source_tlcs);
        assert!(report.conclusion.summary.starts_with("Comparing investigation outcomes"));
    }

    #[test]
    fn accuracy_notes_cover_each_pairing() {
        use IdentificationOutcome::{Inconclusive, No, Yes};
        assert!(accuracy_note(Yes, Yes, 0.0, 1).contains("both investigation modes"));
        assert!(accuracy_note(Yes, Inconclusive, 0.0123, 1).contains("(margin: 0.012)"));
        assert!(accuracy_note(Yes, No, 0.3, 3).contains("ranked #3"));
        assert!(accuracy_note(No, No, 0.3, 2).starts_with("Neither"));
        assert!(accuracy_note(Inconclusive, Inconclusive, 0.0, 1).contains("too close"));
    }
}
