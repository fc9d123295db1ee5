//! RMPS Decoder
//!
//! Approximate maximum-likelihood decoding of a deformed rotated planar lattice. A sample recovery `f` consistent
//! with the syndrome is built first; the decoder then evaluates the probability of the four cosets `f`, `f X`,
//! `f X Z` and `f Z` of the stabilizer group by contracting a tensor network, and returns the representative of the
//! most probable one.
//!
//! The network sits on the qubit grid. Each plaquette contributes one binary index ("is this stabilizer applied?")
//! that is routed along grid bonds joining its corners: SW to NW, SW to SE and SE to NE for bulk plaquettes, and the
//! single bond between the two qubits of a boundary plaquette. A qubit tensor evaluates the prior probability of
//! `f_q` times every plaquette Pauli switched on at that qubit. Plaquette Paulis are read from the lattice, so the
//! same layout serves every variant.
//!

use crate::error_model::*;
use crate::lattice::*;
use crate::pauli::*;
use crate::tensor_network::*;
use crate::util::*;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractionMode {
    /// contract by columns
    Column,
    /// contract by rows
    Row,
    /// average the coset probabilities of both contractions
    Average,
}

impl ContractionMode {
    pub fn abbrev(&self) -> char {
        match self {
            Self::Column => 'c',
            Self::Row => 'r',
            Self::Average => 'a',
        }
    }
}

impl std::str::FromStr for ContractionMode {
    type Err = String;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "c" | "column" => Ok(Self::Column),
            "r" | "row" => Ok(Self::Row),
            "a" | "average" => Ok(Self::Average),
            _ => Err(format!("unknown contraction mode '{value}', expected c, r or a")),
        }
    }
}

/// plaquettes carried by each leg of each qubit tensor
#[derive(Debug, Clone)]
pub struct DecoderLayout {
    pub distance: usize,
    /// `legs[qubit][leg]` in [`NORTH`], [`EAST`], [`SOUTH`], [`WEST`] order
    pub legs: Vec<[Vec<PlaquetteIndex>; 4]>,
}

impl DecoderLayout {
    pub fn new(lattice: &Lattice) -> Self {
        let mut legs: Vec<[Vec<PlaquetteIndex>; 4]> = vec![Default::default(); lattice.qubit_num()];
        let mut route = |a: QubitIndex, b: QubitIndex, index: PlaquetteIndex| {
            let (site_a, site_b) = (lattice.site(a), lattice.site(b));
            let (lower, upper) = if (site_a.x, site_a.y) <= (site_b.x, site_b.y) { (a, b) } else { (b, a) };
            if site_a.x == site_b.x {
                legs[lower][NORTH].push(index);
                legs[upper][SOUTH].push(index);
            } else {
                assert_eq!(site_a.y, site_b.y, "plaquette bonds must join neighbouring qubits");
                legs[lower][EAST].push(index);
                legs[upper][WEST].push(index);
            }
        };
        for plaquette in lattice.plaquettes() {
            let corners = plaquette.corners;
            match (corners[SW], corners[NW], corners[NE], corners[SE]) {
                (Some(sw), Some(nw), Some(ne), Some(se)) => {
                    route(sw, nw, plaquette.index);
                    route(sw, se, plaquette.index);
                    route(se, ne, plaquette.index);
                }
                _ => {
                    let qubits = plaquette.qubits();
                    assert_eq!(qubits.len(), 2);
                    route(qubits[0], qubits[1], plaquette.index);
                }
            }
        }
        Self {
            distance: lattice.distance(),
            legs,
        }
    }

    /// tensor of `qubit` for the sample recovery Pauli `f` on it
    pub fn qubit_tensor(&self, lattice: &Lattice, qubit: QubitIndex, f: Pauli, distribution: &[f64; 4]) -> Array4<f64> {
        let plaquettes = lattice.plaquettes_of_qubit(qubit);
        let legs = &self.legs[qubit];
        let shape: Vec<usize> = legs.iter().map(|leg| 1 << leg.len()).collect();
        let mut tensor = Array4::<f64>::zeros((shape[NORTH], shape[EAST], shape[SOUTH], shape[WEST]));
        // position of each leg plaquette within `plaquettes`
        let positions: Vec<Vec<usize>> = legs
            .iter()
            .map(|leg| {
                leg.iter()
                    .map(|index| {
                        plaquettes
                            .iter()
                            .position(|p| p == index)
                            .expect("bond plaquette must act on the qubit")
                    })
                    .collect()
            })
            .collect();
        for assignment in 0..(1usize << plaquettes.len()) {
            let mut pauli = f;
            for (k, &index) in plaquettes.iter().enumerate() {
                if assignment >> k & 1 == 1 {
                    pauli = pauli.mul(lattice.plaquette(index).pauli_on(qubit));
                }
            }
            let mut leg_index = [0usize; 4];
            for (leg, leg_positions) in positions.iter().enumerate() {
                for (bit, &position) in leg_positions.iter().enumerate() {
                    leg_index[leg] |= (assignment >> position & 1) << bit;
                }
            }
            tensor[leg_index] = distribution[pauli.distribution_index()];
        }
        tensor
    }

    pub fn tensor_grid(&self, lattice: &Lattice, sample: &PauliOperator, distribution: &[f64; 4]) -> TensorGrid {
        let d = self.distance;
        let columns = (0..d)
            .map(|x| {
                (0..d)
                    .map(|y| {
                        let qubit = y * d + x;
                        self.qubit_tensor(lattice, qubit, sample.get(qubit), distribution)
                    })
                    .collect()
            })
            .collect();
        TensorGrid::new(columns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RmpsDecoder {
    /// truncated bond dimension, `None` for exact contraction
    pub chi: Option<usize>,
    pub mode: ContractionMode,
    /// singular values below `tol` times the largest are discarded
    pub tol: Option<f64>,
}

impl Default for RmpsDecoder {
    fn default() -> Self {
        Self {
            chi: Some(8),
            mode: ContractionMode::Column,
            tol: None,
        }
    }
}

/// cosets evaluated by the decoder, in the order of [`RmpsDecoder::coset_log_probabilities`]
pub const COSET_NAMES: [&str; 4] = ["I", "X", "Y", "Z"];

impl RmpsDecoder {
    pub fn new(chi: Option<usize>, mode: ContractionMode, tol: Option<f64>) -> QecResult<Self> {
        if chi == Some(0) {
            return Err(QecError::InvalidParameter("chi must be positive".to_string()));
        }
        if let Some(tol) = tol {
            if tol.is_nan() || tol < 0. {
                return Err(QecError::InvalidParameter(format!("tol must be non-negative, got {tol}")));
            }
        }
        Ok(Self { chi, mode, tol })
    }

    pub fn label(&self) -> String {
        let mut params = vec![];
        if let Some(chi) = self.chi {
            params.push(format!("chi={chi}"));
        }
        params.push(format!("mode={}", self.mode.abbrev()));
        if let Some(tol) = self.tol {
            params.push(format!("tol={tol}"));
        }
        format!("Rotated planar RMPS ({})", params.join(", "))
    }

    /// an operator that reproduces `syndrome`, built from diagonal chains of CSS Paulis to the boundaries
    pub fn sample_recovery(lattice: &Lattice, syndrome: &[bool]) -> QecResult<PauliOperator> {
        let (max_x, max_y) = lattice.site_bounds();
        let mut recovery = lattice.new_pauli();
        let mut toggle = |x: isize, y: isize, base: Pauli| {
            let qubit = lattice
                .site_index(&Coordinate::new(x, y))
                .expect("recovery chains stay inside the lattice");
            recovery.toggle(qubit, lattice.deformed_pauli(qubit, base));
        };
        for index in lattice.syndrome_to_plaquette_indices(syndrome)? {
            let plaquette = lattice.plaquette(index);
            let (px, py) = (plaquette.position.x, plaquette.position.y);
            if plaquette.base_type == Pauli::Z {
                // X chain to the left or right boundary
                if px <= py {
                    for j in 0..=px {
                        toggle(px - j, py - j, Pauli::X);
                    }
                } else {
                    for j in 0..(max_x - px) {
                        toggle(px + 1 + j, py + 1 + j, Pauli::X);
                    }
                }
            } else {
                // Z chain to the bottom or top boundary
                if py <= px {
                    for j in 0..=py {
                        toggle(px - j, py - j, Pauli::Z);
                    }
                } else {
                    for j in 0..(max_y - py) {
                        toggle(px + 1 + j, py + 1 + j, Pauli::Z);
                    }
                }
            }
        }
        Ok(recovery)
    }

    /// natural log of the probability of the coset containing `representative`
    pub fn coset_log_probability(
        &self,
        lattice: &Lattice,
        layout: &DecoderLayout,
        representative: &PauliOperator,
        distribution: &[f64; 4],
    ) -> QecResult<f64> {
        let grid = layout.tensor_grid(lattice, representative, distribution);
        match self.mode {
            ContractionMode::Column => grid.contract(self.chi, self.tol),
            ContractionMode::Row => grid.transpose().contract(self.chi, self.tol),
            ContractionMode::Average => {
                let by_column = grid.contract(self.chi, self.tol)?;
                let by_row = grid.transpose().contract(self.chi, self.tol)?;
                let max = by_column.max(by_row);
                if max == f64::NEG_INFINITY {
                    return Ok(max);
                }
                Ok(max + (((by_column - max).exp() + (by_row - max).exp()) / 2.).ln())
            }
        }
    }

    /// coset representatives `f`, `f X`, `f X Z` and `f Z` of the sample recovery `f`
    pub fn coset_representatives(lattice: &Lattice, sample: &PauliOperator) -> [PauliOperator; 4] {
        let logical_x = lattice.logical_x();
        let logical_z = lattice.logical_z();
        let with_x = sample.product(&logical_x);
        let with_y = with_x.product(&logical_z);
        let with_z = sample.product(&logical_z);
        [sample.clone(), with_x, with_y, with_z]
    }

    /// a coset whose contraction fails is reported as NaN and never chosen
    pub fn coset_log_probabilities(
        &self,
        lattice: &Lattice,
        sample: &PauliOperator,
        distribution: &[f64; 4],
    ) -> QecResult<[f64; 4]> {
        let layout = DecoderLayout::new(lattice);
        let representatives = Self::coset_representatives(lattice, sample);
        let mut log_probabilities = [f64::NEG_INFINITY; 4];
        for (log_probability, representative) in log_probabilities.iter_mut().zip(representatives.iter()) {
            *log_probability = match self.coset_log_probability(lattice, &layout, representative, distribution) {
                Ok(value) => value,
                Err(QecError::DecodingFailure(message)) => {
                    warn!("coset discarded: {message}");
                    f64::NAN
                }
                Err(other) => return Err(other),
            };
        }
        Ok(log_probabilities)
    }

    /// the most probable coset representative given the per-qubit `distribution`
    pub fn decode_with_distribution(
        &self,
        lattice: &Lattice,
        syndrome: &[bool],
        distribution: &[f64; 4],
    ) -> QecResult<PauliOperator> {
        let sample = Self::sample_recovery(lattice, syndrome)?;
        let log_probabilities = self.coset_log_probabilities(lattice, &sample, distribution)?;
        debug!(
            "coset log probabilities {}",
            COSET_NAMES
                .iter()
                .zip(log_probabilities.iter())
                .map(|(name, value)| format!("{name}: {value:.6}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut best: Option<(usize, f64)> = None;
        for (index, &value) in log_probabilities.iter().enumerate() {
            if value.is_finite() && best.map_or(true, |(_, best_value)| value > best_value) {
                best = Some((index, value));
            }
        }
        let (best_index, _) = best.ok_or_else(|| {
            QecError::DecodingFailure(format!("no coset has a finite positive probability: {log_probabilities:?}"))
        })?;
        Ok(Self::coset_representatives(lattice, &sample)[best_index].clone())
    }

    /// decode with the prior of `error_model` at error probability `p`
    pub fn decode(&self, lattice: &Lattice, syndrome: &[bool], error_model: &ErrorModel, p: f64) -> QecResult<PauliOperator> {
        lattice.check_syndrome(syndrome)?;
        let distribution = error_model.probability_distribution(p)?;
        self.decode_with_distribution(lattice, syndrome, &distribution)
    }

    /// decode the syndrome of `error`; the operator must act on every qubit of the lattice
    pub fn decode_error(&self, lattice: &Lattice, error: &PauliOperator, error_model: &ErrorModel, p: f64) -> QecResult<PauliOperator> {
        let syndrome = lattice.syndrome(error)?;
        self.decode(lattice, &syndrome, error_model, p)
    }
}
