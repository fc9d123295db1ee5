//! Pauli Operators
//!
//! Single-qubit Paulis are stored in the symplectic two-bit encoding `I = 0b00`, `X = 0b01`, `Z = 0b10`
//! and `Y = 0b11`, so that products (up to phase) are a bitwise xor and two Paulis anticommute exactly
//! when both are non-identity and differ.
//!

use crate::util::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pauli {
    I = 0b00,
    X = 0b01,
    Z = 0b10,
    Y = 0b11,
}

impl Pauli {
    /// all four Paulis in the order of their bit encoding, used as tensor leg indices
    pub const ALL: [Pauli; 4] = [Pauli::I, Pauli::X, Pauli::Z, Pauli::Y];

    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Pauli::I,
            0b01 => Pauli::X,
            0b10 => Pauli::Z,
            _ => Pauli::Y,
        }
    }

    /// product ignoring the global phase
    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: Self) -> Self {
        Self::from_bits(self.bits() ^ other.bits())
    }

    pub fn commutes(&self, other: &Self) -> bool {
        *self == Pauli::I || *other == Pauli::I || self == other
    }

    pub fn is_identity(&self) -> bool {
        *self == Pauli::I
    }

    /// index into a `(p_I, p_X, p_Y, p_Z)` probability distribution
    pub fn distribution_index(&self) -> usize {
        match self {
            Pauli::I => 0,
            Pauli::X => 1,
            Pauli::Y => 2,
            Pauli::Z => 3,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            Pauli::I => 'I',
            Pauli::X => 'X',
            Pauli::Y => 'Y',
            Pauli::Z => 'Z',
        }
    }
}

impl std::fmt::Display for Pauli {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl TryFrom<char> for Pauli {
    type Error = QecError;
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'I' => Ok(Pauli::I),
            'X' => Ok(Pauli::X),
            'Y' => Ok(Pauli::Y),
            'Z' => Ok(Pauli::Z),
            _ => Err(QecError::InvalidParameter(format!("unknown Pauli '{value}'"))),
        }
    }
}

/// a Pauli operator on every qubit of a lattice, indexed by [`QubitIndex`]; phases are not tracked
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PauliOperator {
    paulis: Vec<Pauli>,
}

impl PauliOperator {
    pub fn new_identity(qubit_num: usize) -> Self {
        Self {
            paulis: vec![Pauli::I; qubit_num],
        }
    }

    pub fn from_paulis(paulis: Vec<Pauli>) -> Self {
        Self { paulis }
    }

    /// parse a string such as `"XIZY"`, whitespace ignored
    pub fn from_string(value: &str) -> QecResult<Self> {
        let paulis = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(Pauli::try_from)
            .collect::<QecResult<Vec<_>>>()?;
        Ok(Self { paulis })
    }

    pub fn len(&self) -> usize {
        self.paulis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paulis.is_empty()
    }

    pub fn paulis(&self) -> &[Pauli] {
        &self.paulis
    }

    pub fn get(&self, qubit: QubitIndex) -> Pauli {
        self.paulis[qubit]
    }

    pub fn set(&mut self, qubit: QubitIndex, pauli: Pauli) {
        self.paulis[qubit] = pauli;
    }

    /// multiply a single qubit in place
    pub fn toggle(&mut self, qubit: QubitIndex, pauli: Pauli) {
        self.paulis[qubit] = self.paulis[qubit].mul(pauli);
    }

    /// multiply by another operator in place
    pub fn apply(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len(), "operators must act on the same number of qubits");
        for (mine, theirs) in self.paulis.iter_mut().zip(other.paulis.iter()) {
            *mine = mine.mul(*theirs);
        }
    }

    pub fn product(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.apply(other);
        result
    }

    /// number of qubits on which the two operators anticommute
    pub fn anticommuting_count(&self, other: &Self) -> usize {
        assert_eq!(self.len(), other.len(), "operators must act on the same number of qubits");
        self.paulis
            .iter()
            .zip(other.paulis.iter())
            .filter(|(a, b)| !a.commutes(b))
            .count()
    }

    pub fn commutes(&self, other: &Self) -> bool {
        self.anticommuting_count(other) % 2 == 0
    }

    pub fn weight(&self) -> usize {
        self.paulis.iter().filter(|p| !p.is_identity()).count()
    }

    pub fn is_identity(&self) -> bool {
        self.weight() == 0
    }

    /// qubits that carry a non-identity Pauli
    pub fn support(&self) -> Vec<QubitIndex> {
        (0..self.len()).filter(|&q| !self.paulis[q].is_identity()).collect()
    }
}

impl std::fmt::Display for PauliOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for pauli in self.paulis.iter() {
            write!(f, "{pauli}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauli_multiplication_table() {
        // cargo test pauli_multiplication_table -- --nocapture
        assert_eq!(Pauli::X.mul(Pauli::Z), Pauli::Y);
        assert_eq!(Pauli::Y.mul(Pauli::Z), Pauli::X);
        assert_eq!(Pauli::Y.mul(Pauli::X), Pauli::Z);
        for pauli in Pauli::ALL {
            assert_eq!(pauli.mul(pauli), Pauli::I);
            assert_eq!(pauli.mul(Pauli::I), pauli);
            assert_eq!(Pauli::from_bits(pauli.bits()), pauli);
        }
    }

    #[test]
    fn pauli_commutation() {
        // cargo test pauli_commutation -- --nocapture
        assert!(!Pauli::X.commutes(&Pauli::Z));
        assert!(!Pauli::Y.commutes(&Pauli::Z));
        assert!(Pauli::Y.commutes(&Pauli::Y));
        assert!(Pauli::I.commutes(&Pauli::X));
        let xx = PauliOperator::from_string("XX").unwrap();
        let zz = PauliOperator::from_string("ZZ").unwrap();
        let zi = PauliOperator::from_string("ZI").unwrap();
        assert!(xx.commutes(&zz));
        assert!(!xx.commutes(&zi));
        assert_eq!(xx.anticommuting_count(&zz), 2);
    }

    #[test]
    fn pauli_operator_basics() {
        // cargo test pauli_operator_basics -- --nocapture
        let mut operator = PauliOperator::from_string("X I Z Y").unwrap();
        assert_eq!(operator.len(), 4);
        assert_eq!(operator.weight(), 3);
        assert_eq!(operator.support(), vec![0, 2, 3]);
        operator.toggle(0, Pauli::Z);
        assert_eq!(operator.get(0), Pauli::Y);
        let product = operator.product(&operator);
        assert!(product.is_identity());
        assert_eq!(format!("{operator}"), "YIZY");
        assert!(PauliOperator::from_string("XQ").is_err());
    }
}
