//! Visualizer
//!
//! ASCII drawings of a lattice for the terminal, and JSON snapshot files of a lattice with Pauli operators and
//! syndromes laid over it
//!

use crate::chrono::Local;
use crate::lattice::*;
use crate::pauli::*;
use crate::serde::{Deserialize, Serialize};
use crate::serde_json;
use crate::urlencoding;
use crate::util::*;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

pub trait QecVisualizer {
    /// take a snapshot, set `abbrev` to true to save space
    fn snapshot(&self, abbrev: bool) -> serde_json::Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizePosition {
    /// vertical axis, -i is up, +i is down (left-up corner is smallest i,j)
    pub i: f64,
    /// horizontal axis, -j is left, +j is right (left-up corner is smallest i,j)
    pub j: f64,
}

impl VisualizePosition {
    /// create a visualization position
    pub fn new(i: f64, j: f64) -> Self {
        Self { i, j }
    }

    /// lattice `y` grows upwards while `i` grows downwards
    pub fn of_coordinate(coordinate: &Coordinate) -> Self {
        Self::new(-(coordinate.y as f64), coordinate.x as f64)
    }
}

#[derive(Debug)]
pub struct Visualizer {
    /// save to file if applicable
    file: Option<File>,
    /// basic snapshot
    base: serde_json::Value,
    /// positions of the qubits
    positions: Vec<VisualizePosition>,
    /// all snapshots
    snapshots: Vec<(String, serde_json::Value)>,
}

pub type ObjectMap = serde_json::Map<String, serde_json::Value>;

/// merge the fields of `value_2` into `value`; a field present in both must agree
pub fn snapshot_combine_values(value: &mut serde_json::Value, mut value_2: serde_json::Value) {
    let value = value.as_object_mut().expect("snapshot must be an object");
    let value_2 = value_2.as_object_mut().expect("snapshot must be an object");
    snapshot_copy_remaining_fields(value, value_2);
}

pub fn snapshot_copy_remaining_fields(obj: &mut ObjectMap, obj_2: &mut ObjectMap) {
    let keys: Vec<String> = obj_2.keys().cloned().collect();
    for key in keys.iter() {
        let value_2 = obj_2.remove(key).expect("key exists");
        match obj.get(key) {
            None => {
                obj.insert(key.clone(), value_2);
            }
            Some(value) => {
                assert_eq!(value, &value_2, "cannot combine different values of `{key}`");
            }
        }
    }
}

impl Visualizer {
    /// create a new visualizer with target filename
    pub fn new(mut filename: Option<String>) -> std::io::Result<Self> {
        if cfg!(feature = "disable_visualizer") {
            filename = None; // do not open file
        }
        let file = match filename {
            Some(filename) => Some(File::create(filename)?),
            None => None,
        };
        Ok(Self {
            file,
            base: json!({}),
            positions: Vec::new(),
            snapshots: Vec::new(),
        })
    }

    /// the lattice is stored once as the base of all snapshots
    pub fn set_lattice(&mut self, lattice: &Lattice) {
        self.base = lattice.snapshot(false);
        self.set_positions(lattice.sites().iter().map(VisualizePosition::of_coordinate).collect(), true);
    }

    /// append another snapshot combined from several objects, and also update the file
    pub fn snapshot_combined(&mut self, name: String, objects: Vec<&dyn QecVisualizer>) -> std::io::Result<()> {
        if cfg!(feature = "disable_visualizer") {
            return Ok(());
        }
        let abbrev = true;
        let mut value = json!({});
        for object in objects.iter() {
            snapshot_combine_values(&mut value, object.snapshot(abbrev));
        }
        self.snapshots.push((name, value));
        self.save()
    }

    /// append another snapshot, and also update the file
    pub fn snapshot(&mut self, name: String, object: &impl QecVisualizer) -> std::io::Result<()> {
        if cfg!(feature = "disable_visualizer") {
            return Ok(());
        }
        let value = object.snapshot(true);
        self.snapshots.push((name, value));
        self.save()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// save to file
    pub fn save(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?; // truncate the file
            file.seek(SeekFrom::Start(0))?; // move the cursor to the front
            file.write_all(
                json!({
                    "base": &self.base,
                    "snapshots": &self.snapshots,
                    "positions": &self.positions,
                })
                .to_string()
                .as_bytes(),
            )?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// set positions of the qubits and optionally center all positions
    pub fn set_positions(&mut self, mut positions: Vec<VisualizePosition>, center: bool) {
        if center && !positions.is_empty() {
            let (mut ci, mut cj) = (0., 0.);
            for position in positions.iter() {
                ci += position.i;
                cj += position.j;
            }
            ci /= positions.len() as f64;
            cj /= positions.len() as f64;
            for position in positions.iter_mut() {
                position.i -= ci;
                position.j -= cj;
            }
        }
        self.positions = positions;
    }
}

impl QecVisualizer for Lattice {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let plaquettes: Vec<serde_json::Value> = self
            .plaquettes()
            .iter()
            .map(|plaquette| {
                let terms: Vec<(QubitIndex, String)> = plaquette.terms.iter().map(|(q, p)| (*q, p.to_string())).collect();
                json!({
                    if abbrev { "p" } else { "position" }: [plaquette.position.x, plaquette.position.y],
                    if abbrev { "t" } else { "terms" }: terms,
                    if abbrev { "b" } else { "is_boundary" }: i32::from(plaquette.is_boundary),
                })
            })
            .collect();
        json!({
            "label": self.label(),
            "distance": self.distance(),
            "plaquettes": plaquettes,
        })
    }
}

/// a named Pauli operator laid over a lattice, e.g. an error or a correction
pub struct OperatorOverlay<'a> {
    pub name: &'a str,
    pub operator: &'a PauliOperator,
}

impl QecVisualizer for OperatorOverlay<'_> {
    fn snapshot(&self, _abbrev: bool) -> serde_json::Value {
        let mut value = json!({});
        value[self.name] = json!(self.operator.to_string());
        value
    }
}

/// violated plaquettes, by index
pub struct SyndromeOverlay<'a> {
    pub syndrome: &'a [bool],
}

impl QecVisualizer for SyndromeOverlay<'_> {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let violated: Vec<PlaquetteIndex> = (0..self.syndrome.len()).filter(|&i| self.syndrome[i]).collect();
        json!({
            if abbrev { "s" } else { "syndrome" }: violated,
        })
    }
}

fn stabilizer_char(stabilizer_type: StabilizerType) -> char {
    match stabilizer_type {
        StabilizerType::X => 'X',
        StabilizerType::Y => 'Y',
        StabilizerType::Z => 'Z',
        StabilizerType::Mixed => 'M',
    }
}

/// draw the lattice with north up: qubits show the Pauli of `overlay` (`.` for identity), plaquettes show their
/// stabilizer type (`M` for mixed) or `*` when violated in `syndrome`
pub fn draw_lattice(lattice: &Lattice, overlay: Option<&PauliOperator>, syndrome: Option<&[bool]>) -> String {
    let max = lattice.distance() as isize - 1;
    let width = (4 * max + 5) as usize;
    let height = (2 * max + 3) as usize;
    let mut canvas = vec![vec![' '; width]; height];
    let column_of = |x: isize| (4 * x + 2) as usize;
    let row_of = |y: isize| (2 * (max - y) + 1) as usize;
    for (qubit, site) in lattice.sites().iter().enumerate() {
        let (row, column) = (row_of(site.y), column_of(site.x));
        canvas[row][column] = match overlay.map(|operator| operator.get(qubit)) {
            Some(pauli) if !pauli.is_identity() => pauli.to_char(),
            _ => '.',
        };
        if site.x < max {
            for offset in 1..4 {
                canvas[row][column + offset] = '-';
            }
        }
        if site.y > 0 {
            canvas[row + 1][column] = '|';
        }
    }
    for plaquette in lattice.plaquettes() {
        let (px, py) = (plaquette.position.x, plaquette.position.y);
        let row = (2 * (max - py)) as usize;
        let column = (4 * px + 4) as usize;
        let violated = syndrome.map_or(false, |syndrome| syndrome.get(plaquette.index).copied().unwrap_or(false));
        canvas[row][column] = if violated { '*' } else { stabilizer_char(plaquette.stabilizer_type) };
    }
    canvas
        .iter()
        .map(|line| line.iter().collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

const DEFAULT_VISUALIZE_DATA_FOLDER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/visualize/data/");

pub fn visualize_data_folder() -> String {
    DEFAULT_VISUALIZE_DATA_FOLDER.to_string()
}

pub fn static_visualize_data_filename() -> String {
    "static.json".to_string()
}

pub fn auto_visualize_data_filename() -> String {
    format!("{}.json", Local::now().format("%Y%m%d-%H-%M-%S%.3f"))
}

/// visualize a lattice, optionally with an error and its decoding, into `visualize_data_folder() + filename`
pub fn visualize_decoding(
    filename: String,
    lattice: &Lattice,
    error: Option<&PauliOperator>,
    correction: Option<&PauliOperator>,
) -> QecResult<()> {
    std::fs::create_dir_all(visualize_data_folder())?;
    let mut visualizer = Visualizer::new(Some(visualize_data_folder() + filename.as_str()))?;
    visualizer.set_lattice(lattice);
    visualizer.snapshot("lattice".to_string(), lattice)?;
    if let Some(error) = error {
        let syndrome = lattice.syndrome(error)?;
        let error_overlay = OperatorOverlay { name: "error", operator: error };
        let syndrome_overlay = SyndromeOverlay { syndrome: &syndrome };
        visualizer.snapshot_combined("syndrome".to_string(), vec![&error_overlay, &syndrome_overlay])?;
        if let Some(correction) = correction {
            let residual = error.product(correction);
            let correction_overlay = OperatorOverlay {
                name: "correction",
                operator: correction,
            };
            let residual_overlay = OperatorOverlay {
                name: "residual",
                operator: &residual,
            };
            visualizer.snapshot_combined(
                "decoded".to_string(),
                vec![&error_overlay, &correction_overlay, &residual_overlay],
            )?;
        }
    }
    print_visualize_link(&filename);
    Ok(())
}

pub fn print_visualize_link_with_parameters(filename: &String, parameters: Vec<(String, String)>) {
    let mut link = format!("http://localhost:8066?filename={}", filename);
    for (key, value) in parameters.iter() {
        link.push('&');
        link.push_str(&urlencoding::encode(key));
        link.push('=');
        link.push_str(&urlencoding::encode(value));
    }
    println!("visualizer data written, view with {link}")
}

pub fn print_visualize_link(filename: &String) {
    print_visualize_link_with_parameters(filename, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualize_draw_lattice_3() {
        // cargo test visualize_draw_lattice_3 -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::Standard).unwrap();
        let drawing = draw_lattice(&lattice, None, None);
        println!("{drawing}");
        let expected = ["    Z", "  .---.---.", "  | X | Z | X", "  .---.---.", "X | Z | X |", "  .---.---.", "        Z"];
        assert_eq!(drawing, expected.join("\n"));
        // every XZZXdY plaquette mixes Paulis
        let lattice = build_lattice(3, LatticeVariant::XZZXdY).unwrap();
        assert_eq!(draw_lattice(&lattice, None, None).matches('M').count(), lattice.plaquette_num());
    }

    #[test]
    fn visualize_draw_overlay_and_syndrome() {
        // cargo test visualize_draw_overlay_and_syndrome -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::XY).unwrap();
        let mut error = lattice.new_pauli();
        error.set(4, Pauli::Z);
        let syndrome = lattice.syndrome(&error).unwrap();
        let drawing = draw_lattice(&lattice, Some(&error), Some(&syndrome));
        println!("{drawing}");
        let lines: Vec<&str> = drawing.lines().collect();
        assert_eq!(lines[3], "  .---Z---.");
        assert_eq!(drawing.matches('*').count(), syndrome.iter().filter(|&&s| s).count());
    }

    #[test]
    fn visualize_snapshot_combine() {
        // cargo test visualize_snapshot_combine -- --nocapture
        let lattice = build_lattice(3, LatticeVariant::XZZXdY).unwrap();
        let error = PauliOperator::from_string("XIIIZIIIY").unwrap();
        let syndrome = lattice.syndrome(&error).unwrap();
        let mut value = json!({});
        snapshot_combine_values(&mut value, OperatorOverlay { name: "error", operator: &error }.snapshot(true));
        snapshot_combine_values(&mut value, SyndromeOverlay { syndrome: &syndrome }.snapshot(true));
        assert_eq!(value["error"], json!("XIIIZIIIY"));
        assert!(value["s"].is_array());
        let mut visualizer = Visualizer::new(None).unwrap();
        visualizer.set_lattice(&lattice);
        visualizer.snapshot("lattice".to_string(), &lattice).unwrap();
        assert_eq!(visualizer.snapshot_count(), if cfg!(feature = "disable_visualizer") { 0 } else { 1 });
    }
}
