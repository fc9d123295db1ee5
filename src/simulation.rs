//! Batch Simulation
//!
//! Monte Carlo estimation of logical failure rates: repeatedly sample an error, decode its syndrome and check
//! whether the residual is a stabilizer. A sweep runs every `(distance, error probability)` configuration of a
//! [`SimulationConfig`] and persists the resulting [`RunRecord`]s as a JSON array.
//!

use crate::decoder::*;
use crate::derivative::Derivative;
use crate::error_model::*;
use crate::lattice::*;
use crate::pauli::*;
use crate::rand_xoshiro::rand_core::SeedableRng;
use crate::util::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Instant;
use tracing::{info, warn};

/// seeds of different configurations in a sweep are separated by this offset
pub const CONFIGURATION_SEED_OFFSET: u64 = 1_000_000_000;

/// outcome of a single trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    /// the residual is a stabilizer
    pub success: bool,
    /// the decoder could not produce a correction
    pub decoding_failure: bool,
    pub error_weight: usize,
    /// whether the residual anticommutes with logical X, Y and Z; all false on a decoding failure
    pub logical_commutations: [bool; 3],
}

/// aggregated statistics of repeated trials on one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub code: String,
    pub n_k_d: (usize, usize, usize),
    pub error_model: String,
    pub decoder: String,
    pub error_probability: f64,
    pub n_run: usize,
    pub n_success: usize,
    pub n_fail: usize,
    pub n_decoding_failure: usize,
    /// number of trials whose residual anticommutes with logical X, Y and Z
    pub n_logical_commutations: [usize; 3],
    pub error_weight_total: usize,
    /// population variance of the error weight
    pub error_weight_pvar: f64,
    pub logical_failure_rate: f64,
    pub physical_error_rate: f64,
    /// seconds spent in the whole run
    pub wall_time: f64,
    pub seed: u64,
}

/// the residual of a recovery is harmless when it lies in the stabilizer group: no syndrome and commuting with
/// both logicals
pub fn is_recovery_successful(lattice: &Lattice, residual: &PauliOperator) -> QecResult<bool> {
    let returns_to_codespace = lattice.syndrome(residual)?.iter().all(|&violated| !violated);
    Ok(returns_to_codespace && residual.commutes(&lattice.logical_x()) && residual.commutes(&lattice.logical_z()))
}

/// sample an error, decode it and evaluate the residual
pub fn run_once(
    lattice: &Lattice,
    error_model: &ErrorModel,
    decoder: &RmpsDecoder,
    error_probability: f64,
    rng: &mut DeterministicRng,
) -> QecResult<TrialOutcome> {
    let error = error_model.generate(lattice.qubit_num(), error_probability, rng)?;
    let syndrome = lattice.syndrome(&error)?;
    let error_weight = error.weight();
    let correction = match decoder.decode(lattice, &syndrome, error_model, error_probability) {
        Ok(correction) => correction,
        Err(QecError::DecodingFailure(message)) => {
            warn!("decoding failure counted as logical failure: {message}");
            return Ok(TrialOutcome {
                success: false,
                decoding_failure: true,
                error_weight,
                logical_commutations: [false; 3],
            });
        }
        Err(other) => return Err(other),
    };
    let residual: PauliOperator = error.product(&correction);
    let returns_to_codespace = lattice.syndrome(&residual)?.iter().all(|&violated| !violated);
    if !returns_to_codespace {
        warn!("recovery does not return to codespace");
    }
    let logical_commutations = [
        !residual.commutes(&lattice.logical_x()),
        !residual.commutes(&lattice.logical_y()),
        !residual.commutes(&lattice.logical_z()),
    ];
    let success = returns_to_codespace && !logical_commutations[0] && !logical_commutations[2];
    Ok(TrialOutcome {
        success,
        decoding_failure: false,
        error_weight,
        logical_commutations,
    })
}

/// run `max_runs` trials, trial `i` seeded with `seed + i`
pub fn run(
    lattice: &Lattice,
    error_model: &ErrorModel,
    decoder: &RmpsDecoder,
    error_probability: f64,
    max_runs: usize,
    seed: u64,
) -> QecResult<RunRecord> {
    run_with_progress(lattice, error_model, decoder, error_probability, max_runs, seed, |_| {})
}

/// [`run`] reporting the number of finished trials to `progress`
pub fn run_with_progress(
    lattice: &Lattice,
    error_model: &ErrorModel,
    decoder: &RmpsDecoder,
    error_probability: f64,
    max_runs: usize,
    seed: u64,
    mut progress: impl FnMut(usize),
) -> QecResult<RunRecord> {
    let begin = Instant::now();
    let mut n_success = 0;
    let mut n_decoding_failure = 0;
    let mut n_logical_commutations = [0; 3];
    let mut error_weights = Vec::with_capacity(max_runs);
    for trial in 0..max_runs {
        let mut rng = DeterministicRng::seed_from_u64(seed.wrapping_add(trial as u64));
        let outcome = run_once(lattice, error_model, decoder, error_probability, &mut rng)?;
        if outcome.success {
            n_success += 1;
        }
        if outcome.decoding_failure {
            n_decoding_failure += 1;
        }
        for (count, &anticommutes) in n_logical_commutations.iter_mut().zip(outcome.logical_commutations.iter()) {
            if anticommutes {
                *count += 1;
            }
        }
        error_weights.push(outcome.error_weight);
        progress(trial + 1);
    }
    let n_run = max_runs;
    let error_weight_total: usize = error_weights.iter().sum();
    let (mean, error_weight_pvar) = if n_run == 0 {
        (0., 0.)
    } else {
        let mean = error_weight_total as f64 / n_run as f64;
        let pvar = error_weights.iter().map(|&w| (w as f64 - mean).powi(2)).sum::<f64>() / n_run as f64;
        (mean, pvar)
    };
    let n_fail = n_run - n_success;
    let logical_failure_rate = if n_run == 0 { 0. } else { n_fail as f64 / n_run as f64 };
    let physical_error_rate = mean / lattice.qubit_num() as f64;
    Ok(RunRecord {
        code: lattice.label(),
        n_k_d: lattice.n_k_d(),
        error_model: error_model.label(),
        decoder: decoder.label(),
        error_probability,
        n_run,
        n_success,
        n_fail,
        n_decoding_failure,
        n_logical_commutations,
        error_weight_total,
        error_weight_pvar,
        logical_failure_rate,
        physical_error_rate,
        wall_time: begin.elapsed().as_secs_f64(),
        seed,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    #[derivative(Default(value = "LatticeVariant::XZZXdY"))]
    #[serde(default = "simulation_default_configs::variant")]
    pub variant: LatticeVariant,
    /// relative strength of the biased Pauli
    #[derivative(Default(value = "simulation_default_configs::bias()"))]
    #[serde(default = "simulation_default_configs::bias")]
    pub bias: f64,
    #[derivative(Default(value = "Axis::Z"))]
    #[serde(default = "simulation_default_configs::axis")]
    pub axis: Axis,
    #[derivative(Default(value = "simulation_default_configs::min_distance()"))]
    #[serde(default = "simulation_default_configs::min_distance")]
    pub min_distance: usize,
    #[derivative(Default(value = "simulation_default_configs::max_distance()"))]
    #[serde(default = "simulation_default_configs::max_distance")]
    pub max_distance: usize,
    #[derivative(Default(value = "simulation_default_configs::distance_step()"))]
    #[serde(default = "simulation_default_configs::distance_step")]
    pub distance_step: usize,
    #[derivative(Default(value = "0."))]
    #[serde(default)]
    pub min_error_probability: f64,
    /// the hashing bound of the biased channel when absent
    #[serde(default)]
    pub max_error_probability: Option<f64>,
    #[derivative(Default(value = "simulation_default_configs::num_points()"))]
    #[serde(default = "simulation_default_configs::num_points")]
    pub num_points: usize,
    #[derivative(Default(value = "simulation_default_configs::max_runs()"))]
    #[serde(default = "simulation_default_configs::max_runs")]
    pub max_runs: usize,
    #[derivative(Default(value = "Some(simulation_default_configs::chi())"))]
    #[serde(default = "simulation_default_configs::chi_option")]
    pub chi: Option<usize>,
    #[derivative(Default(value = "ContractionMode::Column"))]
    #[serde(default = "simulation_default_configs::mode")]
    pub mode: ContractionMode,
    #[serde(default)]
    pub tol: Option<f64>,
    #[serde(default)]
    pub seed: u64,
    #[derivative(Default(value = "simulation_default_configs::output()"))]
    #[serde(default = "simulation_default_configs::output")]
    pub output: String,
}

pub mod simulation_default_configs {
    use super::*;
    pub fn variant() -> LatticeVariant {
        LatticeVariant::XZZXdY
    }
    pub fn bias() -> f64 {
        300.
    }
    pub fn axis() -> Axis {
        Axis::Z
    }
    pub fn min_distance() -> usize {
        9
    }
    pub fn max_distance() -> usize {
        51
    }
    pub fn distance_step() -> usize {
        6
    }
    pub fn num_points() -> usize {
        25
    }
    pub fn max_runs() -> usize {
        1000
    }
    pub fn chi() -> usize {
        12
    }
    pub fn chi_option() -> Option<usize> {
        Some(chi())
    }
    pub fn mode() -> ContractionMode {
        ContractionMode::Column
    }
    pub fn output() -> String {
        "eta_300_d9-51.json".to_string()
    }
}

/// error probability at which the hashing bound of a biased channel crosses zero rate, `(1 + 1/bias) / (2 + 1/bias)`
pub fn hashing_point(bias: f64) -> f64 {
    (1. + 1. / bias) / (2. + 1. / bias)
}

/// `count` evenly spaced values from `start` to `stop` inclusive
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => (0..count)
            .map(|i| start + (stop - start) * (i as f64) / ((count - 1) as f64))
            .collect(),
    }
}

impl SimulationConfig {
    pub fn from_file(filename: &str) -> QecResult<Self> {
        let file = File::open(filename)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn sanity_check(&self) -> QecResult<()> {
        if self.distance_step == 0 {
            return Err(QecError::InvalidParameter("distance step must be positive".to_string()));
        }
        if self.min_distance > self.max_distance {
            return Err(QecError::InvalidParameter(format!(
                "min distance {} exceeds max distance {}",
                self.min_distance, self.max_distance
            )));
        }
        for distance in self.distances() {
            if distance < MIN_DISTANCE || distance % 2 == 0 {
                return Err(QecError::InvalidDistance(distance));
            }
        }
        self.error_model()?;
        self.decoder()?;
        Ok(())
    }

    pub fn distances(&self) -> Vec<usize> {
        (self.min_distance..=self.max_distance).step_by(self.distance_step.max(1)).collect()
    }

    pub fn error_probabilities(&self) -> Vec<f64> {
        let max_error_probability = self.max_error_probability.unwrap_or_else(|| hashing_point(self.bias));
        linspace(self.min_error_probability, max_error_probability, self.num_points)
    }

    pub fn error_model(&self) -> QecResult<ErrorModel> {
        ErrorModel::new_biased(self.bias, self.axis)
    }

    pub fn decoder(&self) -> QecResult<RmpsDecoder> {
        RmpsDecoder::new(self.chi, self.mode, self.tol)
    }

    /// number of `(distance, error probability)` configurations
    pub fn configuration_num(&self) -> usize {
        self.distances().len() * self.error_probabilities().len()
    }
}

/// run every configuration of the sweep, distance-major; `progress` is called with
/// `(configuration index, distance, error probability, finished trials)`
pub fn simulate(config: &SimulationConfig, mut progress: impl FnMut(usize, usize, f64, usize)) -> QecResult<Vec<RunRecord>> {
    config.sanity_check()?;
    let error_model = config.error_model()?;
    let decoder = config.decoder()?;
    let error_probabilities = config.error_probabilities();
    let mut records = Vec::with_capacity(config.configuration_num());
    let mut configuration_index = 0;
    for distance in config.distances() {
        let lattice = build_lattice(distance, config.variant)?;
        for &error_probability in error_probabilities.iter() {
            let seed = config
                .seed
                .wrapping_add((configuration_index as u64).wrapping_mul(CONFIGURATION_SEED_OFFSET));
            let record = run_with_progress(&lattice, &error_model, &decoder, error_probability, config.max_runs, seed, |finished| {
                progress(configuration_index, distance, error_probability, finished)
            })?;
            info!(
                "{} p={:.4}: failure rate {:.4} ({}/{}), {} decoding failures, {:.2}s",
                record.code,
                error_probability,
                record.logical_failure_rate,
                record.n_fail,
                record.n_run,
                record.n_decoding_failure,
                record.wall_time
            );
            records.push(record);
            configuration_index += 1;
        }
    }
    Ok(records)
}

pub fn save_data(filename: &str, records: &[RunRecord]) -> QecResult<()> {
    let file = File::create(filename)?;
    serde_json::to_writer(BufWriter::new(file), records)?;
    Ok(())
}

pub fn load_data(filename: &str) -> QecResult<Vec<RunRecord>> {
    let file = File::open(filename)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// reference logical failure rates `(P_f, P_fZ)` at the hashing point of a Z-biased channel, where `P_fZ` counts
/// residuals anticommuting with logical Z and `P_f` any logical failure
pub fn analytic_failure_rates(bias: f64, distance: usize) -> (f64, f64) {
    let decay = (-2. * (2. * distance as f64 - 1.) * (1. / (2. * bias)).atanh()).exp();
    let failure_rate = 0.75 - 0.25 * decay;
    let z_failure_rate = 0.5 - 0.5 * decay;
    (failure_rate, z_failure_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_default_config() {
        // cargo test simulation_default_config -- --nocapture
        let config = SimulationConfig::default();
        assert_eq!(config.variant, LatticeVariant::XZZXdY);
        assert_eq!(config.distances(), vec![9, 15, 21, 27, 33, 39, 45, 51]);
        let error_probabilities = config.error_probabilities();
        assert_eq!(error_probabilities.len(), 25);
        assert_eq!(error_probabilities[0], 0.);
        // hashing point (1 + 1/300) / (2 + 1/300)
        assert!((error_probabilities[24] - 301. / 601.).abs() < 1e-12);
        assert!((hashing_point(300.) - 301. / 601.).abs() < 1e-12);
        assert_eq!(config.chi, Some(12));
        assert_eq!(config.output, "eta_300_d9-51.json");
        assert_eq!(config.configuration_num(), 200);
        config.sanity_check().unwrap();
        // an empty JSON object falls back to the defaults
        let parsed: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, config);
        let parsed: SimulationConfig = serde_json::from_str(r#"{"min_distance": 3, "max_distance": 5, "variant": "XY"}"#).unwrap();
        assert_eq!(parsed.distances(), vec![3]);
        assert_eq!(parsed.variant, LatticeVariant::XY);
    }

    #[test]
    fn simulation_config_sanity_check() {
        // cargo test simulation_config_sanity_check -- --nocapture
        let config = SimulationConfig {
            min_distance: 4,
            max_distance: 4,
            ..Default::default()
        };
        assert!(matches!(config.sanity_check(), Err(QecError::InvalidDistance(4))));
        let config = SimulationConfig {
            distance_step: 0,
            ..Default::default()
        };
        assert!(config.sanity_check().is_err());
        let config = SimulationConfig {
            chi: Some(0),
            ..Default::default()
        };
        assert!(config.sanity_check().is_err());
    }

    #[test]
    fn simulation_recovery_success() {
        // cargo test simulation_recovery_success -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::XZZXdY).unwrap();
        assert!(is_recovery_successful(&lattice, &lattice.new_pauli()).unwrap());
        let stabilizer = lattice.plaquette_operator(0);
        assert!(is_recovery_successful(&lattice, &stabilizer).unwrap());
        assert!(!is_recovery_successful(&lattice, &lattice.logical_x()).unwrap());
        // commutes with both logicals but leaves a syndrome
        let mut residual = lattice.new_pauli();
        residual.set(4, Pauli::X);
        assert!(residual.commutes(&lattice.logical_x()) && residual.commutes(&lattice.logical_z()));
        assert!(lattice.syndrome(&residual).unwrap().iter().any(|&violated| violated));
        assert!(!is_recovery_successful(&lattice, &residual).unwrap());
    }

    #[test]
    fn simulation_linspace() {
        // cargo test simulation_linspace -- --nocapture
        assert_eq!(linspace(0., 1., 5), vec![0., 0.25, 0.5, 0.75, 1.]);
        assert_eq!(linspace(0.3, 1., 1), vec![0.3]);
        assert!(linspace(0., 1., 0).is_empty());
    }

    #[test]
    fn simulation_run_record() {
        // cargo test simulation_run_record -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::XZZXdY).unwrap();
        let error_model = ErrorModel::new_biased(10., Axis::Z).unwrap();
        let decoder = RmpsDecoder::new(Some(4), ContractionMode::Column, None).unwrap();
        let record = run(&lattice, &error_model, &decoder, 0.1, 40, 5).unwrap();
        assert_eq!(record.code, "Rotated planar XZZXdY 3");
        assert_eq!(record.n_k_d, (9, 1, 3));
        assert_eq!(record.decoder, "Rotated planar RMPS (chi=4, mode=c)");
        assert_eq!(record.error_model, "Biased-depolarizing (bias=10, axis='Z')");
        assert_eq!(record.n_run, 40);
        assert_eq!(record.n_success + record.n_fail, 40);
        assert!(record.n_logical_commutations.iter().all(|&count| count <= record.n_fail));
        assert!((record.logical_failure_rate - record.n_fail as f64 / 40.).abs() < 1e-12);
        assert!((record.physical_error_rate - record.error_weight_total as f64 / 360.).abs() < 1e-12);
        assert!(record.error_weight_pvar >= 0.);
        // same seed, same statistics
        let again = run(&lattice, &error_model, &decoder, 0.1, 40, 5).unwrap();
        assert_eq!(again.n_fail, record.n_fail);
        assert_eq!(again.error_weight_total, record.error_weight_total);
    }

    #[test]
    fn simulation_zero_error_probability_always_succeeds() {
        // cargo test simulation_zero_error_probability_always_succeeds -- --nocapture
        let lattice = build_lattice(5, LatticeVariant::XY).unwrap();
        let error_model = ErrorModel::new_biased(300., Axis::Z).unwrap();
        let decoder = RmpsDecoder::new(Some(4), ContractionMode::Column, None).unwrap();
        let record = run(&lattice, &error_model, &decoder, 0., 5, 0).unwrap();
        assert_eq!(record.n_success, 5);
        assert_eq!(record.error_weight_total, 0);
        assert_eq!(record.logical_failure_rate, 0.);
    }

    #[test]
    fn simulation_save_and_load() {
        // cargo test simulation_save_and_load -- --nocapture
        let config = SimulationConfig {
            min_distance: 3,
            max_distance: 5,
            distance_step: 2,
            num_points: 2,
            max_error_probability: Some(0.1),
            max_runs: 3,
            chi: Some(4),
            ..Default::default()
        };
        let mut calls = 0;
        let records = simulate(&config, |_, _, _, _| calls += 1).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(calls, 12);
        assert_eq!(records[0].seed, 0);
        assert_eq!(records[1].seed, CONFIGURATION_SEED_OFFSET);
        let filename = std::env::temp_dir().join("qecsim_deformed_simulation_save_and_load.json");
        let filename = filename.to_str().unwrap();
        save_data(filename, &records).unwrap();
        let loaded = load_data(filename).unwrap();
        assert_eq!(loaded, records);
        std::fs::remove_file(filename).unwrap();
    }

    #[test]
    fn simulation_analytic_failure_rates() {
        // cargo test simulation_analytic_failure_rates -- --nocapture
        let (failure_rate, z_failure_rate) = analytic_failure_rates(300., 9);
        let decay = (-34. * (1f64 / 600.).atanh()).exp();
        assert!((z_failure_rate - (0.5 - 0.5 * decay)).abs() < 1e-12);
        assert!((failure_rate - (0.75 - 0.25 * decay)).abs() < 1e-12);
        // longer codes approach the fully mixed limits
        let (failure_rate_51, z_failure_rate_51) = analytic_failure_rates(300., 51);
        assert!(failure_rate_51 > failure_rate && failure_rate_51 < 0.75);
        assert!(z_failure_rate_51 > z_failure_rate && z_failure_rate_51 < 0.5);
    }
}
