//! Lattice Geometry
//!
//! Rotated planar surface codes of odd distance `d` on a `d x d` grid of qubits, and their Clifford-deformed variants.
//!
//! Qubit sites are indexed by `(x, y)` with the origin at the lower-left qubit. A plaquette is indexed by the site at
//! its lower-left corner, so plaquette coordinates range over `-1 ..= d-1`. Z-parity plaquettes have `x + y` even;
//! they live in the bulk and on the top/bottom boundaries. X-parity plaquettes live in the bulk and on the left/right
//! boundaries. For `d = 3`:
//!
//! ```text
//!              -------
//!             /       \
//!            |  (0,2)  |
//!            +---------+---------+-----
//!            |         |         |     \
//!            |  (0,1)  |  (1,1)  |(2,1) |
//!            |         |         |     /
//!       -----+---------+---------+-----
//!      /     |         |         |
//!     |(-1,0)|  (0,0)  |  (1,0)  |
//!      \     |         |         |
//!       -----+---------+---------+
//!                      |  (1,-1) |
//!                       \       /
//!                        -------
//! ```
//!
//! Every variant is the CSS code (Z-parity plaquettes all Z, X-parity plaquettes all X) conjugated by a single-qubit
//! Clifford on each site, see [`SiteClifford`]. Coordinates and plaquette adjacency are therefore identical across
//! variants; only the Pauli labels differ.
//!

use crate::pauli::*;
use crate::util::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// the smallest supported code distance
pub const MIN_DISTANCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LatticeVariant {
    /// CSS rotated planar code
    Standard,
    /// XZ/ZX plaquettes
    XZZX,
    /// XZZX with the Y/Z exchange along the upper-left to lower-right diagonal
    XZZXdY,
    /// XX/XX and YY/YY plaquettes
    XY,
}

impl std::fmt::Display for LatticeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Standard => "Standard",
            Self::XZZX => "XZZX",
            Self::XZZXdY => "XZZXdY",
            Self::XY => "XY",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for LatticeVariant {
    type Err = String;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "standard" | "css" => Ok(Self::Standard),
            "xzzx" => Ok(Self::XZZX),
            "xzzxdy" => Ok(Self::XZZXdY),
            "xy" => Ok(Self::XY),
            _ => Err(format!("unknown lattice variant '{value}', expected one of Standard, XZZX, XZZXdY, XY")),
        }
    }
}

/// single-qubit Clifford that permutes {X, Y, Z}, applied to a site of the CSS code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteClifford {
    Identity,
    /// X <-> Z
    Hadamard,
    /// X -> X, Y <-> Z
    SwapYZ,
}

impl SiteClifford {
    pub fn apply(&self, pauli: Pauli) -> Pauli {
        match (self, pauli) {
            (Self::Hadamard, Pauli::X) => Pauli::Z,
            (Self::Hadamard, Pauli::Z) => Pauli::X,
            (Self::SwapYZ, Pauli::Y) => Pauli::Z,
            (Self::SwapYZ, Pauli::Z) => Pauli::Y,
            _ => pauli,
        }
    }

    fn of_site(variant: LatticeVariant, distance: usize, site: Coordinate) -> Self {
        let parity_odd = (site.x + site.y).rem_euclid(2) == 1;
        let on_anti_diagonal = site.x + site.y == distance as isize - 1;
        match variant {
            LatticeVariant::Standard => Self::Identity,
            LatticeVariant::XZZX => {
                if parity_odd {
                    Self::Hadamard
                } else {
                    Self::Identity
                }
            }
            LatticeVariant::XZZXdY => {
                // anti-diagonal sites have even parity for odd distance, so the two rules never overlap
                if on_anti_diagonal {
                    Self::SwapYZ
                } else if parity_odd {
                    Self::Hadamard
                } else {
                    Self::Identity
                }
            }
            LatticeVariant::XY => Self::SwapYZ,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StabilizerType {
    X,
    Y,
    Z,
    /// the plaquette carries more than one kind of Pauli
    Mixed,
}

/// corners of a plaquette in the order its operator terms are listed
pub const CORNER_OFFSETS: [(isize, isize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];
pub const SW: usize = 0;
pub const NW: usize = 1;
pub const NE: usize = 2;
pub const SE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plaquette {
    pub index: PlaquetteIndex,
    /// coordinate of the lower-left corner
    pub position: Coordinate,
    /// the Pauli this plaquette measures in the undeformed CSS code, either X or Z
    pub base_type: Pauli,
    /// qubits at the SW, NW, NE and SE corners, `None` when the corner is outside the lattice
    pub corners: [Option<QubitIndex>; 4],
    /// operator terms in SW, NW, NE, SE order
    pub terms: Vec<(QubitIndex, Pauli)>,
    pub stabilizer_type: StabilizerType,
    pub is_boundary: bool,
}

impl Plaquette {
    pub fn qubits(&self) -> Vec<QubitIndex> {
        self.terms.iter().map(|(qubit, _)| *qubit).collect()
    }

    /// the Pauli this plaquette applies on `qubit`, identity if the qubit is not in its support
    pub fn pauli_on(&self, qubit: QubitIndex) -> Pauli {
        self.terms
            .iter()
            .find(|(q, _)| *q == qubit)
            .map(|(_, pauli)| *pauli)
            .unwrap_or(Pauli::I)
    }

    /// whether this plaquette anticommutes with `operator`
    pub fn is_violated_by(&self, operator: &PauliOperator) -> bool {
        self.terms
            .iter()
            .filter(|(qubit, pauli)| !pauli.commutes(&operator.get(*qubit)))
            .count()
            % 2
            == 1
    }
}

/// a rotated planar code lattice; immutable after [`build_lattice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
    distance: usize,
    variant: LatticeVariant,
    /// site coordinates, `sites[y * d + x] = (x, y)`
    sites: Vec<Coordinate>,
    cliffords: Vec<SiteClifford>,
    plaquettes: Vec<Plaquette>,
    plaquette_lookup: HashMap<Coordinate, PlaquetteIndex>,
    /// plaquettes that act on each qubit
    qubit_plaquettes: Vec<Vec<PlaquetteIndex>>,
}

/// build the lattice of a rotated planar code variant; `distance` must be odd and at least 3
pub fn build_lattice(distance: usize, variant: LatticeVariant) -> QecResult<Lattice> {
    Lattice::new(distance, variant)
}

impl Lattice {
    pub fn new(distance: usize, variant: LatticeVariant) -> QecResult<Self> {
        if distance < MIN_DISTANCE || distance % 2 == 0 {
            return Err(QecError::InvalidDistance(distance));
        }
        let d = distance as isize;
        let mut sites = Vec::with_capacity(distance * distance);
        let mut cliffords = Vec::with_capacity(distance * distance);
        for y in 0..d {
            for x in 0..d {
                let site = Coordinate::new(x, y);
                sites.push(site);
                cliffords.push(SiteClifford::of_site(variant, distance, site));
            }
        }
        let mut lattice = Self {
            distance,
            variant,
            sites,
            cliffords,
            plaquettes: Vec::with_capacity(distance * distance - 1),
            plaquette_lookup: HashMap::new(),
            qubit_plaquettes: vec![vec![]; distance * distance],
        };
        for y in -1..d {
            for x in -1..d {
                let position = Coordinate::new(x, y);
                if !lattice.is_in_plaquette_bounds(&position) {
                    continue;
                }
                let index = lattice.plaquettes.len();
                let base_type = if lattice.is_z_plaquette(&position) { Pauli::Z } else { Pauli::X };
                let mut corners = [None; 4];
                let mut terms = Vec::with_capacity(4);
                for (corner, (dx, dy)) in CORNER_OFFSETS.iter().enumerate() {
                    let site = Coordinate::new(x + dx, y + dy);
                    if let Some(qubit) = lattice.site_index(&site) {
                        corners[corner] = Some(qubit);
                        terms.push((qubit, lattice.cliffords[qubit].apply(base_type)));
                        lattice.qubit_plaquettes[qubit].push(index);
                    }
                }
                let stabilizer_type = match terms[0].1 {
                    first if terms.iter().all(|(_, pauli)| *pauli == first) => match first {
                        Pauli::X => StabilizerType::X,
                        Pauli::Y => StabilizerType::Y,
                        _ => StabilizerType::Z,
                    },
                    _ => StabilizerType::Mixed,
                };
                let is_boundary = terms.len() == 2;
                lattice.plaquette_lookup.insert(position, index);
                lattice.plaquettes.push(Plaquette {
                    index,
                    position,
                    base_type,
                    corners,
                    terms,
                    stabilizer_type,
                    is_boundary,
                });
            }
        }
        debug_assert_eq!(lattice.plaquettes.len(), distance * distance - 1);
        Ok(lattice)
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    pub fn variant(&self) -> LatticeVariant {
        self.variant
    }

    /// `(n, k, d)` of the code
    pub fn n_k_d(&self) -> (usize, usize, usize) {
        (self.distance * self.distance, 1, self.distance)
    }

    pub fn label(&self) -> String {
        match self.variant {
            LatticeVariant::Standard => format!("Rotated planar {}", self.distance),
            variant => format!("Rotated planar {variant} {}", self.distance),
        }
    }

    pub fn qubit_num(&self) -> usize {
        self.sites.len()
    }

    pub fn plaquette_num(&self) -> usize {
        self.plaquettes.len()
    }

    pub fn sites(&self) -> &[Coordinate] {
        &self.sites
    }

    pub fn site(&self, qubit: QubitIndex) -> Coordinate {
        self.sites[qubit]
    }

    pub fn site_clifford(&self, qubit: QubitIndex) -> SiteClifford {
        self.cliffords[qubit]
    }

    pub fn plaquettes(&self) -> &[Plaquette] {
        &self.plaquettes
    }

    pub fn plaquette(&self, index: PlaquetteIndex) -> &Plaquette {
        &self.plaquettes[index]
    }

    pub fn plaquette_at(&self, position: &Coordinate) -> Option<&Plaquette> {
        self.plaquette_lookup.get(position).map(|&index| &self.plaquettes[index])
    }

    /// plaquettes acting on `qubit`
    pub fn plaquettes_of_qubit(&self, qubit: QubitIndex) -> &[PlaquetteIndex] {
        &self.qubit_plaquettes[qubit]
    }

    /// largest site coordinate in each direction, `(d-1, d-1)`
    pub fn site_bounds(&self) -> (isize, isize) {
        let max = self.distance as isize - 1;
        (max, max)
    }

    pub fn is_in_site_bounds(&self, site: &Coordinate) -> bool {
        let (max_x, max_y) = self.site_bounds();
        (0..=max_x).contains(&site.x) && (0..=max_y).contains(&site.y)
    }

    pub fn is_z_plaquette(&self, position: &Coordinate) -> bool {
        (position.x + position.y).rem_euclid(2) == 0
    }

    pub fn is_in_plaquette_bounds(&self, position: &Coordinate) -> bool {
        let (max_x, max_y) = self.site_bounds();
        let (x, y) = (position.x, position.y);
        let x_in_bulk = (0..max_x).contains(&x);
        let y_in_bulk = (0..max_y).contains(&y);
        if x_in_bulk && y_in_bulk {
            return true;
        }
        let left_or_right = (x == -1 || x == max_x) && y_in_bulk;
        let bottom_or_top = (y == -1 || y == max_y) && x_in_bulk;
        (left_or_right && !self.is_z_plaquette(position)) || (bottom_or_top && self.is_z_plaquette(position))
    }

    pub fn site_index(&self, site: &Coordinate) -> Option<QubitIndex> {
        if self.is_in_site_bounds(site) {
            Some(site.y as usize * self.distance + site.x as usize)
        } else {
            None
        }
    }

    /// the image of a CSS Pauli on `qubit` under the site's deformation
    pub fn deformed_pauli(&self, qubit: QubitIndex, base_pauli: Pauli) -> Pauli {
        self.cliffords[qubit].apply(base_pauli)
    }

    /// identity operator on this lattice
    pub fn new_pauli(&self) -> PauliOperator {
        PauliOperator::new_identity(self.qubit_num())
    }

    /// build an operator from site coordinates; Paulis on the same site are multiplied
    pub fn pauli_from_map<'a>(&self, entries: impl IntoIterator<Item = (&'a Coordinate, &'a Pauli)>) -> QecResult<PauliOperator> {
        let mut operator = self.new_pauli();
        for (site, pauli) in entries {
            let qubit = self
                .site_index(site)
                .ok_or_else(|| QecError::MalformedSyndrome(format!("site {site} is outside the lattice of distance {}", self.distance)))?;
            operator.toggle(qubit, *pauli);
        }
        Ok(operator)
    }

    pub fn plaquette_operator(&self, index: PlaquetteIndex) -> PauliOperator {
        let mut operator = self.new_pauli();
        for &(qubit, pauli) in self.plaquettes[index].terms.iter() {
            operator.set(qubit, pauli);
        }
        operator
    }

    pub fn stabilizers(&self) -> Vec<PauliOperator> {
        (0..self.plaquette_num()).map(|index| self.plaquette_operator(index)).collect()
    }

    /// image of CSS X on the bottom row
    pub fn logical_x(&self) -> PauliOperator {
        let mut operator = self.new_pauli();
        for x in 0..self.distance {
            let qubit = x;
            operator.set(qubit, self.deformed_pauli(qubit, Pauli::X));
        }
        operator
    }

    /// image of CSS Z on the rightmost column
    pub fn logical_z(&self) -> PauliOperator {
        let mut operator = self.new_pauli();
        for y in 0..self.distance {
            let qubit = y * self.distance + (self.distance - 1);
            operator.set(qubit, self.deformed_pauli(qubit, Pauli::Z));
        }
        operator
    }

    pub fn logical_y(&self) -> PauliOperator {
        self.logical_x().product(&self.logical_z())
    }

    /// logical X and Z
    pub fn logicals(&self) -> [PauliOperator; 2] {
        [self.logical_x(), self.logical_z()]
    }

    /// one bit per plaquette in plaquette order, true when the plaquette anticommutes with `error`
    pub fn syndrome(&self, error: &PauliOperator) -> QecResult<Vec<bool>> {
        if error.len() != self.qubit_num() {
            return Err(QecError::MalformedSyndrome(format!(
                "operator acts on {} qubits but the lattice has {}",
                error.len(),
                self.qubit_num()
            )));
        }
        Ok(self.plaquettes.iter().map(|plaquette| plaquette.is_violated_by(error)).collect())
    }

    pub fn syndrome_to_plaquette_indices(&self, syndrome: &[bool]) -> QecResult<Vec<PlaquetteIndex>> {
        self.check_syndrome(syndrome)?;
        Ok(syndrome
            .iter()
            .enumerate()
            .filter(|(_, violated)| **violated)
            .map(|(index, _)| index)
            .collect())
    }

    pub fn check_syndrome(&self, syndrome: &[bool]) -> QecResult<()> {
        if syndrome.len() != self.plaquette_num() {
            return Err(QecError::MalformedSyndrome(format!(
                "syndrome has {} bits but the lattice has {} plaquettes",
                syndrome.len(),
                self.plaquette_num()
            )));
        }
        Ok(())
    }
}
