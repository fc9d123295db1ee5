//! Error Model
//!
//! Independent and identically distributed single-qubit Pauli channels.
//!

use crate::pauli::*;
use crate::util::*;
use serde::{Deserialize, Serialize};

/// the Pauli favoured by a biased channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
            Self::Z => write!(f, "Z"),
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = String;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "X" | "x" => Ok(Self::X),
            "Y" | "y" => Ok(Self::Y),
            "Z" | "z" => Ok(Self::Z),
            _ => Err(format!("unknown axis '{value}', expected X, Y or Z")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ErrorModel {
    /// X, Y and Z each with probability p/3
    #[default]
    Depolarizing,
    BitFlip,
    PhaseFlip,
    /// the `axis` Pauli is `bias` times more likely than each of the other two; infinite bias is pure dephasing
    /// along `axis`
    BiasedDepolarizing { bias: f64, axis: Axis },
}

impl ErrorModel {
    pub fn new_biased(bias: f64, axis: Axis) -> QecResult<Self> {
        if bias.is_nan() || bias <= 0. {
            return Err(QecError::InvalidParameter(format!("bias must be positive, got {bias}")));
        }
        Ok(Self::BiasedDepolarizing { bias, axis })
    }

    /// probability of `(I, X, Y, Z)` on each qubit
    pub fn probability_distribution(&self, p: f64) -> QecResult<[f64; 4]> {
        if !(0. ..=1.).contains(&p) {
            return Err(QecError::InvalidParameter(format!("error probability must be in [0, 1], got {p}")));
        }
        Ok(match *self {
            Self::Depolarizing => [1. - p, p / 3., p / 3., p / 3.],
            Self::BitFlip => [1. - p, p, 0., 0.],
            Self::PhaseFlip => [1. - p, 0., 0., p],
            Self::BiasedDepolarizing { bias, axis } => {
                let (high, low) = if bias.is_infinite() {
                    (p, 0.)
                } else {
                    (bias * p / (bias + 1.), p / (2. * (bias + 1.)))
                };
                match axis {
                    Axis::X => [1. - p, high, low, low],
                    Axis::Y => [1. - p, low, high, low],
                    Axis::Z => [1. - p, low, low, high],
                }
            }
        })
    }

    /// sample an error on `qubit_num` qubits
    pub fn generate(&self, qubit_num: usize, p: f64, rng: &mut DeterministicRng) -> QecResult<PauliOperator> {
        let [p_i, p_x, p_y, _] = self.probability_distribution(p)?;
        let mut error = PauliOperator::new_identity(qubit_num);
        for qubit in 0..qubit_num {
            let random = rng.next_f64();
            let pauli = if random < p_i {
                Pauli::I
            } else if random < p_i + p_x {
                Pauli::X
            } else if random < p_i + p_x + p_y {
                Pauli::Y
            } else {
                Pauli::Z
            };
            error.set(qubit, pauli);
        }
        Ok(error)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Depolarizing => "Depolarizing".to_string(),
            Self::BitFlip => "Bit-flip".to_string(),
            Self::PhaseFlip => "Phase-flip".to_string(),
            Self::BiasedDepolarizing { bias, axis } => format!("Biased-depolarizing (bias={bias}, axis='{axis}')"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn error_model_distributions_sum_to_one() {
        // cargo test error_model_distributions_sum_to_one -- --nocapture
        let models = [
            ErrorModel::Depolarizing,
            ErrorModel::BitFlip,
            ErrorModel::PhaseFlip,
            ErrorModel::BiasedDepolarizing { bias: 300., axis: Axis::Z },
            ErrorModel::BiasedDepolarizing { bias: 0.5, axis: Axis::X },
            ErrorModel::BiasedDepolarizing { bias: f64::INFINITY, axis: Axis::Y },
        ];
        for model in models {
            for p in [0., 0.01, 0.1, 0.3, 0.5, 1.] {
                let distribution = model.probability_distribution(p).unwrap();
                let sum: f64 = distribution.iter().sum();
                assert!((sum - 1.).abs() < 1e-12, "{} at p={p} sums to {sum}", model.label());
                assert!(distribution.iter().all(|&v| v >= 0.));
            }
        }
        assert_eq!(ErrorModel::default(), ErrorModel::Depolarizing);
        assert!(ErrorModel::Depolarizing.probability_distribution(1.5).is_err());
        assert!(ErrorModel::new_biased(-1., Axis::Z).is_err());
    }

    #[test]
    fn error_model_biased_formula() {
        // cargo test error_model_biased_formula -- --nocapture
        let model = ErrorModel::new_biased(10., Axis::Z).unwrap();
        let [p_i, p_x, p_y, p_z] = model.probability_distribution(0.11).unwrap();
        assert!((p_i - 0.89).abs() < 1e-12);
        assert!((p_x - 0.005).abs() < 1e-12);
        assert!((p_y - 0.005).abs() < 1e-12);
        assert!((p_z - 0.1).abs() < 1e-12);
        // bias 1/2 is standard depolarizing
        let [_, p_x, p_y, p_z] = ErrorModel::new_biased(0.5, Axis::Z).unwrap().probability_distribution(0.3).unwrap();
        assert!((p_x - 0.1).abs() < 1e-12 && (p_y - 0.1).abs() < 1e-12 && (p_z - 0.1).abs() < 1e-12);
        assert_eq!(model.label(), "Biased-depolarizing (bias=10, axis='Z')");
    }

    #[test]
    fn error_model_generate() {
        // cargo test error_model_generate -- --nocapture
        let model = ErrorModel::PhaseFlip;
        let mut rng = DeterministicRng::seed_from_u64(0);
        let error = model.generate(10000, 0.2, &mut rng).unwrap();
        assert!(error.paulis().iter().all(|&pauli| pauli == Pauli::I || pauli == Pauli::Z));
        let weight = error.weight() as f64;
        assert!((weight / 10000. - 0.2).abs() < 0.02);
        let mut rng_1 = DeterministicRng::seed_from_u64(42);
        let mut rng_2 = DeterministicRng::seed_from_u64(42);
        assert_eq!(
            ErrorModel::Depolarizing.generate(50, 0.3, &mut rng_1).unwrap(),
            ErrorModel::Depolarizing.generate(50, 0.3, &mut rng_2).unwrap()
        );
        assert!(model.generate(20, 0., &mut rng).unwrap().is_identity());
    }
}
