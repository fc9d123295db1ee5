//! Command Line Interface
//!
//! `qecsim_deformed` with no subcommand runs the default sweep of [`SimulationConfig`]
//!

use crate::clap;
use crate::clap::{Parser, Subcommand};
use crate::decoder::*;
use crate::error_model::*;
use crate::lattice::*;
use crate::pbr::ProgressBar;
use crate::rand_xoshiro::rand_core::SeedableRng;
use crate::simulation::*;
use crate::util::*;
use crate::visualize::*;
use std::io::Stderr;
use tracing::{info, warn};

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Clifford-deformed rotated planar codes (XZZXdY, XY) decoded by tensor network contraction")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Commands {
    /// sweep code distances and error probabilities and save the run records as JSON
    Simulate(SimulateParameters),
    /// decode random errors on a single configuration and report the decoding time
    Benchmark(BenchmarkParameters),
    /// print the lattice of a code, optionally with a random error and its correction
    Draw(DrawParameters),
}

/// every flag overrides the configuration file, which in turn overrides the defaults
#[derive(Parser, Clone, Debug, Default)]
pub struct SimulateParameters {
    /// load the full configuration from a JSON file
    #[clap(long, value_parser)]
    pub config: Option<String>,
    /// lattice variant: Standard, XZZX, XZZXdY or XY
    #[clap(long, value_parser)]
    pub variant: Option<String>,
    /// bias of the biased-depolarizing error model
    #[clap(long, value_parser)]
    pub bias: Option<f64>,
    /// favoured Pauli of the biased-depolarizing error model: X, Y or Z
    #[clap(long, value_parser)]
    pub axis: Option<String>,
    #[clap(long, value_parser)]
    pub min_distance: Option<usize>,
    #[clap(long, value_parser)]
    pub max_distance: Option<usize>,
    #[clap(long, value_parser)]
    pub distance_step: Option<usize>,
    #[clap(long, value_parser)]
    pub min_error_probability: Option<f64>,
    /// defaults to the hashing point of the biased channel
    #[clap(long, value_parser)]
    pub max_error_probability: Option<f64>,
    /// number of error probabilities in the sweep
    #[clap(long, value_parser)]
    pub num_points: Option<usize>,
    /// trials per configuration
    #[clap(long, value_parser)]
    pub max_runs: Option<usize>,
    /// bond dimension of the decoder
    #[clap(long, value_parser)]
    pub chi: Option<usize>,
    /// contract without truncation, exponentially slow in the distance
    #[clap(long, conflicts_with = "chi")]
    pub exact: bool,
    /// contraction mode: c (columns), r (rows) or a (average)
    #[clap(long, value_parser)]
    pub mode: Option<String>,
    #[clap(long, value_parser)]
    pub tol: Option<f64>,
    #[clap(long, value_parser)]
    pub seed: Option<u64>,
    /// JSON file to write the run records to
    #[clap(short = 'o', long, value_parser)]
    pub output: Option<String>,
    /// do not show the progress bar
    #[clap(long)]
    pub no_progress: bool,
}

#[derive(Parser, Clone, Debug)]
pub struct BenchmarkParameters {
    /// code distance
    #[clap(value_parser)]
    pub d: usize,
    /// physical error probability
    #[clap(value_parser)]
    pub p: f64,
    #[clap(long, default_value = "XZZXdY", value_parser)]
    pub variant: String,
    #[clap(long, default_value_t = 300., value_parser)]
    pub bias: f64,
    #[clap(long, default_value = "Z", value_parser)]
    pub axis: String,
    #[clap(long, default_value_t = 12, value_parser)]
    pub chi: usize,
    #[clap(long, default_value = "c", value_parser)]
    pub mode: String,
    #[clap(short = 'r', long, default_value_t = 100, value_parser)]
    pub total_rounds: usize,
    #[clap(long, default_value_t = 0, value_parser)]
    pub seed: u64,
    /// write one JSON line per decoding round
    #[clap(long, value_parser)]
    pub profiler_output: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct DrawParameters {
    /// code distance
    #[clap(value_parser)]
    pub d: usize,
    #[clap(long, default_value = "XZZXdY", value_parser)]
    pub variant: String,
    /// sample an error at this probability and decode it
    #[clap(short = 'p', long, value_parser)]
    pub error_probability: Option<f64>,
    #[clap(long, default_value_t = 300., value_parser)]
    pub bias: f64,
    #[clap(long, default_value = "Z", value_parser)]
    pub axis: String,
    #[clap(long, default_value_t = 12, value_parser)]
    pub chi: usize,
    #[clap(long, default_value_t = 0, value_parser)]
    pub seed: u64,
    /// also write a visualizer data file
    #[clap(long)]
    pub enable_visualizer: bool,
}

fn parse_parameter<T: std::str::FromStr<Err = String>>(value: &str) -> QecResult<T> {
    value.parse().map_err(QecError::InvalidParameter)
}

impl Cli {
    pub fn run(self) -> QecResult<()> {
        match self.command {
            None => SimulateParameters::default().run(),
            Some(Commands::Simulate(parameters)) => parameters.run(),
            Some(Commands::Benchmark(parameters)) => parameters.run(),
            Some(Commands::Draw(parameters)) => parameters.run(),
        }
    }
}

impl SimulateParameters {
    pub fn build_config(&self) -> QecResult<SimulationConfig> {
        let mut config = match &self.config {
            Some(filename) => SimulationConfig::from_file(filename)?,
            None => SimulationConfig::default(),
        };
        if let Some(variant) = &self.variant {
            config.variant = parse_parameter(variant)?;
        }
        if let Some(axis) = &self.axis {
            config.axis = parse_parameter(axis)?;
        }
        if let Some(mode) = &self.mode {
            config.mode = parse_parameter(mode)?;
        }
        if let Some(bias) = self.bias {
            config.bias = bias;
        }
        if let Some(min_distance) = self.min_distance {
            config.min_distance = min_distance;
        }
        if let Some(max_distance) = self.max_distance {
            config.max_distance = max_distance;
        }
        if let Some(distance_step) = self.distance_step {
            config.distance_step = distance_step;
        }
        if let Some(min_error_probability) = self.min_error_probability {
            config.min_error_probability = min_error_probability;
        }
        if let Some(num_points) = self.num_points {
            config.num_points = num_points;
        }
        if let Some(max_runs) = self.max_runs {
            config.max_runs = max_runs;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if self.max_error_probability.is_some() {
            config.max_error_probability = self.max_error_probability;
        }
        if self.chi.is_some() {
            config.chi = self.chi;
        }
        if self.exact {
            config.chi = None;
        }
        if self.tol.is_some() {
            config.tol = self.tol;
        }
        config.sanity_check()?;
        Ok(config)
    }

    pub fn run(&self) -> QecResult<()> {
        let config = self.build_config()?;
        let configuration_num = config.configuration_num();
        info!(
            "sweeping {} configurations of {} x {} runs, writing to {}",
            configuration_num,
            config.variant,
            config.max_runs,
            config.output
        );
        let mut progress_bar: Option<(usize, ProgressBar<Stderr>)> = None;
        let show_progress = !self.no_progress;
        let records = simulate(&config, |index, distance, error_probability, finished| {
            if !show_progress {
                return;
            }
            if progress_bar.as_ref().map_or(true, |(current, _)| *current != index) {
                if let Some((_, mut pb)) = progress_bar.take() {
                    pb.finish();
                    eprintln!();
                }
                let mut pb = ProgressBar::on(std::io::stderr(), config.max_runs as u64);
                pb.message(format!("d={distance} p={error_probability:.4} [{index}/{configuration_num}] ").as_str());
                progress_bar = Some((index, pb));
            }
            if let Some((_, pb)) = progress_bar.as_mut() {
                pb.set(finished as u64);
            }
        })?;
        if let Some((_, mut pb)) = progress_bar.take() {
            pb.finish();
            eprintln!();
        }
        save_data(&config.output, &records)?;
        info!("saved {} run records to {}", records.len(), config.output);
        Ok(())
    }
}

impl BenchmarkParameters {
    pub fn run(&self) -> QecResult<()> {
        let lattice = build_lattice(self.d, parse_parameter(&self.variant)?)?;
        let error_model = ErrorModel::new_biased(self.bias, parse_parameter(&self.axis)?)?;
        let decoder = RmpsDecoder::new(Some(self.chi), parse_parameter(&self.mode)?, None)?;
        let mut profiler = DecodingProfiler::new(self.profiler_output.clone())?;
        let mut pb = ProgressBar::on(std::io::stderr(), self.total_rounds as u64);
        let (mut n_fail, mut n_decoding_failure) = (0, 0);
        for round in 0..self.total_rounds {
            pb.set(round as u64);
            let mut rng = DeterministicRng::seed_from_u64(self.seed.wrapping_add(round as u64));
            let error = error_model.generate(lattice.qubit_num(), self.p, &mut rng)?;
            let syndrome = lattice.syndrome(&error)?;
            profiler.begin(syndrome.iter().filter(|&&violated| violated).count());
            let result = decoder.decode(&lattice, &syndrome, &error_model, self.p);
            profiler.end()?;
            match result {
                Ok(correction) => {
                    if !is_recovery_successful(&lattice, &error.product(&correction))? {
                        n_fail += 1;
                    }
                }
                Err(QecError::DecodingFailure(message)) => {
                    warn!("round {round}: {message}");
                    n_fail += 1;
                    n_decoding_failure += 1;
                }
                Err(other) => return Err(other),
            }
            pb.message(format!("{} ", profiler.brief()).as_str());
        }
        pb.finish();
        eprintln!();
        println!("{}", profiler.brief());
        info!(
            "{} with {} at p={}: {}/{} failures ({} decoding failures)",
            lattice.label(),
            decoder.label(),
            self.p,
            n_fail,
            self.total_rounds,
            n_decoding_failure
        );
        Ok(())
    }
}

impl DrawParameters {
    pub fn run(&self) -> QecResult<()> {
        let lattice = build_lattice(self.d, parse_parameter(&self.variant)?)?;
        println!("{}", lattice.label());
        let error_probability = match self.error_probability {
            None => {
                println!("{}", draw_lattice(&lattice, None, None));
                if self.enable_visualizer {
                    visualize_decoding(auto_visualize_data_filename(), &lattice, None, None)?;
                }
                return Ok(());
            }
            Some(error_probability) => error_probability,
        };
        let error_model = ErrorModel::new_biased(self.bias, parse_parameter(&self.axis)?)?;
        let decoder = RmpsDecoder::new(Some(self.chi), ContractionMode::Column, None)?;
        let mut rng = DeterministicRng::seed_from_u64(self.seed);
        let error = error_model.generate(lattice.qubit_num(), error_probability, &mut rng)?;
        let syndrome = lattice.syndrome(&error)?;
        println!("error:\n{}", draw_lattice(&lattice, Some(&error), Some(&syndrome)));
        let correction = match decoder.decode(&lattice, &syndrome, &error_model, error_probability) {
            Ok(correction) => correction,
            Err(QecError::DecodingFailure(message)) => {
                warn!("{message}");
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        let residual = error.product(&correction);
        println!("correction:\n{}", draw_lattice(&lattice, Some(&correction), None));
        let success = is_recovery_successful(&lattice, &residual)?;
        println!("residual:\n{}", draw_lattice(&lattice, Some(&residual), None));
        println!("{}", if success { "decoding succeeded" } else { "logical failure" });
        if self.enable_visualizer {
            visualize_decoding(auto_visualize_data_filename(), &lattice, Some(&error), Some(&correction))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_no_subcommand() {
        // cargo test cli_no_subcommand -- --nocapture
        let cli = Cli::try_parse_from(["qecsim_deformed"]).unwrap();
        assert!(cli.command.is_none());
        let config = SimulateParameters::default().build_config().unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn cli_simulate_overrides() {
        // cargo test cli_simulate_overrides -- --nocapture
        let cli = Cli::try_parse_from([
            "qecsim_deformed",
            "simulate",
            "--variant",
            "XY",
            "--min-distance",
            "3",
            "--max-distance",
            "7",
            "--distance-step",
            "2",
            "--mode",
            "a",
            "--exact",
            "-o",
            "out.json",
        ])
        .unwrap();
        let parameters = match cli.command {
            Some(Commands::Simulate(parameters)) => parameters,
            _ => unreachable!(),
        };
        let config = parameters.build_config().unwrap();
        assert_eq!(config.variant, LatticeVariant::XY);
        assert_eq!(config.distances(), vec![3, 5, 7]);
        assert_eq!(config.mode, ContractionMode::Average);
        assert_eq!(config.chi, None);
        assert_eq!(config.output, "out.json");
        assert_eq!(config.bias, 300.);
    }

    #[test]
    fn cli_invalid_parameters() {
        // cargo test cli_invalid_parameters -- --nocapture
        let parameters = SimulateParameters {
            variant: Some("toric".to_string()),
            ..Default::default()
        };
        assert!(matches!(parameters.build_config(), Err(QecError::InvalidParameter(_))));
        let parameters = SimulateParameters {
            min_distance: Some(2),
            max_distance: Some(2),
            ..Default::default()
        };
        assert!(matches!(parameters.build_config(), Err(QecError::InvalidDistance(2))));
    }

    #[test]
    fn cli_draw() {
        // cargo test cli_draw -- --nocapture
        let cli = Cli::try_parse_from(["qecsim_deformed", "draw", "5", "--variant", "XY", "-p", "0.1", "--chi", "4"]).unwrap();
        cli.run().unwrap();
    }
}
