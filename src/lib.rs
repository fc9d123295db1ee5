extern crate chrono;
extern crate clap;
extern crate derivative;
extern crate pbr;
extern crate rand_xoshiro;
extern crate serde;
#[macro_use]
extern crate serde_json;
extern crate nalgebra;
extern crate ndarray;
extern crate thiserror;
extern crate tracing;
extern crate urlencoding;

pub mod cli;
pub mod decoder;
pub mod error_model;
pub mod lattice;
pub mod pauli;
pub mod simulation;
pub mod tensor_network;
pub mod util;
pub mod visualize;

use decoder::*;
use error_model::*;
pub use lattice::{build_lattice, Lattice, LatticeVariant};
use pauli::*;
use util::*;

/// error probability of the depolarizing prior used by [`decode`]
pub const DEFAULT_PRIOR_ERROR_PROBABILITY: f64 = 0.1;

/// decode a syndrome with the default RMPS decoder (`chi = 8`, contraction by columns) under a depolarizing prior
/// with `p = 0.1`; the result is a Pauli operator on every qubit of `lattice` that reproduces the syndrome
pub fn decode(lattice: &Lattice, syndrome: &[bool]) -> QecResult<PauliOperator> {
    RmpsDecoder::default().decode(lattice, syndrome, &ErrorModel::Depolarizing, DEFAULT_PRIOR_ERROR_PROBABILITY)
}

/// decode the syndrome of `error` with the defaults of [`decode`]
pub fn decode_error(lattice: &Lattice, error: &PauliOperator) -> QecResult<PauliOperator> {
    let syndrome = lattice.syndrome(error)?;
    decode(lattice, &syndrome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_default_corrects_single_errors() {
        // cargo test decode_default_corrects_single_errors -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::XZZXdY).unwrap();
        for qubit in 0..lattice.qubit_num() {
            let mut error = lattice.new_pauli();
            error.set(qubit, Pauli::Y);
            let correction = decode_error(&lattice, &error).unwrap();
            let residual = error.product(&correction);
            assert!(lattice.syndrome(&residual).unwrap().iter().all(|&s| !s));
            assert!(residual.commutes(&lattice.logical_x()) && residual.commutes(&lattice.logical_z()));
        }
    }
}
