use crate::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::time::Instant;
use thiserror::Error;

/// index of a qubit in the dense ordering `y * d + x`
pub type QubitIndex = usize;
/// index of a plaquette in [`crate::lattice::Lattice::plaquettes`]
pub type PlaquetteIndex = usize;

/// lattice coordinate in the format (x, y), origin at the lower-left qubit;
/// plaquettes use the coordinate of the qubit at their lower-left corner, so they may be negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: isize,
    pub y: isize,
}

impl Coordinate {
    pub fn new(x: isize, y: isize) -> Self {
        Self { x, y }
    }

    /// two coordinates are adjacent if they lie within the same 2x2 block
    pub fn is_adjacent(&self, other: &Self) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl From<(isize, isize)> for Coordinate {
    fn from((x, y): (isize, isize)) -> Self {
        Self::new(x, y)
    }
}

#[derive(Debug, Error)]
pub enum QecError {
    /// code distance must be an odd integer >= 3
    #[error("invalid code distance {0}: must be an odd integer >= 3")]
    InvalidDistance(usize),
    /// the operator or syndrome does not fit the lattice
    #[error("malformed syndrome: {0}")]
    MalformedSyndrome(String),
    /// the tensor network could not produce a correction
    #[error("decoding failure: {0}")]
    DecodingFailure(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type QecResult<T> = Result<T, QecError>;

/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// record the decoding time of multiple trials
pub struct DecodingProfiler {
    /// each record corresponds to a different trial
    pub records: Vec<DecodingProfilerEntry>,
    /// summation of all decoding time
    pub sum_round_time: f64,
    /// total number of violated plaquettes over all trials
    pub sum_defects: usize,
    /// the file to output the profiler results, one JSON line per trial
    pub profiler_output: Option<File>,
}

impl DecodingProfiler {
    pub fn new(detail_log_file: Option<String>) -> QecResult<Self> {
        let profiler_output = match detail_log_file {
            Some(filename) => Some(File::create(filename)?),
            None => None,
        };
        Ok(Self {
            records: vec![],
            sum_round_time: 0.,
            sum_defects: 0,
            profiler_output,
        })
    }

    /// record the beginning of a decoding procedure
    pub fn begin(&mut self, defect_num: usize) {
        // sanity check last entry, if exists, is complete
        if let Some(last_entry) = self.records.last() {
            assert!(
                last_entry.is_complete(),
                "the last profiler entry is not complete, make sure to call `begin` and `end` in pairs"
            );
        }
        let mut entry = DecodingProfilerEntry::new(defect_num);
        entry.record_begin();
        self.records.push(entry);
    }

    /// record the ending of a decoding procedure
    pub fn end(&mut self) -> QecResult<()> {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `end`");
        last_entry.record_end();
        let round_time = last_entry.round_time.unwrap_or(0.);
        self.sum_round_time += round_time;
        self.sum_defects += last_entry.defect_num;
        if let Some(file) = self.profiler_output.as_mut() {
            let value = json!({
                "round_time": round_time,
                "defect_num": last_entry.defect_num,
            });
            file.write_all(serde_json::to_string(&value)?.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let per_trial = self.sum_round_time / (self.records.len().max(1) as f64);
        let per_defect = self.sum_round_time / (self.sum_defects.max(1) as f64);
        format!("trial: {per_trial:.3e}, defect: {per_defect:.3e},")
    }
}

pub struct DecodingProfilerEntry {
    /// the number of violated plaquettes of this decoding problem
    pub defect_num: usize,
    /// the time of beginning a decoding procedure
    begin_time: Option<Instant>,
    /// interval between calling [`Self::record_begin`] to calling [`Self::record_end`]
    pub round_time: Option<f64>,
}

impl DecodingProfilerEntry {
    pub fn new(defect_num: usize) -> Self {
        Self {
            defect_num,
            begin_time: None,
            round_time: None,
        }
    }
    /// record the beginning of a decoding procedure
    pub fn record_begin(&mut self) {
        assert_eq!(self.begin_time, None, "do not call `record_begin` twice on the same entry");
        self.begin_time = Some(Instant::now());
    }
    /// record the ending of a decoding procedure
    pub fn record_end(&mut self) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_end`");
        self.round_time = Some(begin_time.elapsed().as_secs_f64());
    }
    pub fn is_complete(&self) -> bool {
        self.round_time.is_some()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn util_deterministic_rng_range() {
        // cargo test util_deterministic_rng_range -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(123);
        for _ in 0..10000 {
            let value = rng.next_f64();
            assert!((0. ..1.).contains(&value));
        }
        let mut rng_1 = DeterministicRng::seed_from_u64(7);
        let mut rng_2 = DeterministicRng::seed_from_u64(7);
        assert_eq!(rng_1.next_f64(), rng_2.next_f64());
    }

    #[test]
    fn util_coordinate_adjacency() {
        // cargo test util_coordinate_adjacency -- --nocapture
        let origin = Coordinate::new(0, 0);
        assert!(origin.is_adjacent(&Coordinate::new(1, 1)));
        assert!(origin.is_adjacent(&Coordinate::new(0, -1)));
        assert!(!origin.is_adjacent(&Coordinate::new(2, 0)));
        assert!(!origin.is_adjacent(&origin));
    }

    #[test]
    fn util_decoding_profiler() {
        // cargo test util_decoding_profiler -- --nocapture
        let mut profiler = DecodingProfiler::new(None).unwrap();
        for defect_num in [0, 2, 4] {
            profiler.begin(defect_num);
            profiler.end().unwrap();
        }
        assert_eq!(profiler.records.len(), 3);
        assert_eq!(profiler.sum_defects, 6);
        assert!(profiler.brief().starts_with("trial: "));
    }
}
