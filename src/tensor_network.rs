//! Tensor Network Contraction
//!
//! A rectangular grid of 4-leg tensors `T[n, e, s, w]`, contracted column by column into a boundary matrix product
//! state (MPS). Each MPS site has legs `[l, p, r]`: `l` is the bond to the site below, `p` is the dangling east leg
//! of the absorbed column and `r` is the bond to the site above. When `chi` is given, the MPS is brought into
//! right-canonical form by a QR sweep after each column, then every bond is truncated by an SVD sweep in the other
//! direction, so each cut keeps the dominant singular values of the whole boundary state.
//!
//! Values are tracked as a mantissa network plus an accumulated natural logarithm, so contracting large lattices at
//! small error rates does not underflow.
//!

use crate::util::*;
use nalgebra::DMatrix;
use ndarray::{Array3, Array4, Axis as NdAxis};

/// tensor leg positions
pub const NORTH: usize = 0;
pub const EAST: usize = 1;
pub const SOUTH: usize = 2;
pub const WEST: usize = 3;

#[derive(Debug, Clone)]
pub struct TensorGrid {
    pub width: usize,
    pub height: usize,
    /// `columns[x][y]`, with `y = 0` the southmost row
    pub columns: Vec<Vec<Array4<f64>>>,
}

impl TensorGrid {
    pub fn new(columns: Vec<Vec<Array4<f64>>>) -> Self {
        let width = columns.len();
        assert!(width > 0, "empty tensor grid");
        let height = columns[0].len();
        let grid = Self { width, height, columns };
        grid.sanity_check();
        grid
    }

    /// bond dimensions of neighbouring tensors must match and the outer legs must be trivial
    pub fn sanity_check(&self) {
        for (x, column) in self.columns.iter().enumerate() {
            assert_eq!(column.len(), self.height, "column {x} has a different height");
            for (y, tensor) in column.iter().enumerate() {
                let shape = tensor.shape();
                if y == 0 {
                    assert_eq!(shape[SOUTH], 1, "south boundary leg of ({x},{y}) must be trivial");
                } else {
                    assert_eq!(shape[SOUTH], column[y - 1].shape()[NORTH], "vertical bond mismatch at ({x},{y})");
                }
                if y + 1 == self.height {
                    assert_eq!(shape[NORTH], 1, "north boundary leg of ({x},{y}) must be trivial");
                }
                if x == 0 {
                    assert_eq!(shape[WEST], 1, "west boundary leg of ({x},{y}) must be trivial");
                } else {
                    assert_eq!(shape[WEST], self.columns[x - 1][y].shape()[EAST], "horizontal bond mismatch at ({x},{y})");
                }
                if x + 1 == self.width {
                    assert_eq!(shape[EAST], 1, "east boundary leg of ({x},{y}) must be trivial");
                }
            }
        }
    }

    /// reflect the grid about its diagonal, so that contracting the result by columns contracts this grid by rows
    pub fn transpose(&self) -> Self {
        let columns = (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.columns[x][y].view().permuted_axes([EAST, NORTH, WEST, SOUTH]).to_owned())
                    .collect()
            })
            .collect();
        Self {
            width: self.height,
            height: self.width,
            columns,
        }
    }

    /// natural logarithm of the full contraction, `-inf` when the network evaluates to zero
    pub fn contract(&self, chi: Option<usize>, tol: Option<f64>) -> QecResult<f64> {
        let mut mps = Mps::from_first_column(&self.columns[0]);
        mps.normalize()?;
        if let Some(chi) = chi {
            mps.truncate(chi, tol)?;
        }
        for column in self.columns.iter().skip(1) {
            if mps.log_scale == f64::NEG_INFINITY {
                return Ok(f64::NEG_INFINITY);
            }
            mps.absorb_column(column);
            mps.normalize()?;
            if let Some(chi) = chi {
                mps.truncate(chi, tol)?;
            }
        }
        mps.close()
    }
}

/// boundary MPS, the mantissa sites times `exp(log_scale)`
#[derive(Debug, Clone)]
pub struct Mps {
    pub sites: Vec<Array3<f64>>,
    pub log_scale: f64,
}

impl Mps {
    pub fn from_first_column(column: &[Array4<f64>]) -> Self {
        let sites = column
            .iter()
            .map(|tensor| {
                // A[s, e, n] = T[n, e, s, 0]
                tensor.index_axis(NdAxis(WEST), 0).permuted_axes([2, 1, 0]).to_owned()
            })
            .collect();
        Self { sites, log_scale: 0. }
    }

    /// contract the east legs of the MPS with the west legs of `column`
    pub fn absorb_column(&mut self, column: &[Array4<f64>]) {
        assert_eq!(column.len(), self.sites.len());
        for (site, tensor) in self.sites.iter_mut().zip(column.iter()) {
            let (dl, dw, dr) = site.dim();
            let (dn, de, ds, dw_tensor) = tensor.dim();
            assert_eq!(dw, dw_tensor, "east leg of the MPS does not match the west leg of the column");
            let mut absorbed = Array3::<f64>::zeros((dl * ds, de, dr * dn));
            for l in 0..dl {
                for r in 0..dr {
                    for w in 0..dw {
                        let a = site[[l, w, r]];
                        if a == 0. {
                            continue;
                        }
                        for n in 0..dn {
                            for e in 0..de {
                                for s in 0..ds {
                                    let t = tensor[[n, e, s, w]];
                                    if t != 0. {
                                        absorbed[[l * ds + s, e, r * dn + n]] += a * t;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            *site = absorbed;
        }
    }

    /// divide site `y` by its largest magnitude and move the factor into `log_scale`; false when the site vanishes
    fn rescale_site(&mut self, y: usize) -> QecResult<bool> {
        let site = &mut self.sites[y];
        if let Some(value) = site.iter().find(|v| !v.is_finite()) {
            return Err(QecError::DecodingFailure(format!("non-finite tensor entry {value}")));
        }
        let max = site.iter().fold(0f64, |acc, v| acc.max(v.abs()));
        if max == 0. {
            self.log_scale = f64::NEG_INFINITY;
            return Ok(false);
        }
        site.mapv_inplace(|v| v / max);
        self.log_scale += max.ln();
        Ok(true)
    }

    /// rescale every site so that its largest entry has magnitude 1
    pub fn normalize(&mut self) -> QecResult<()> {
        for y in 0..self.sites.len() {
            if !self.rescale_site(y)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// top-to-bottom QR sweep leaving every site above the first one a right isometry
    pub fn right_canonicalize(&mut self) -> QecResult<()> {
        for y in (1..self.sites.len()).rev() {
            let (dl, dp, dr) = self.sites[y].dim();
            let site = &self.sites[y];
            // transpose of the site reshaped to `l x (p r)`
            let matrix = DMatrix::from_fn(dp * dr, dl, |i, l| site[[l, i / dr, i % dr]]);
            let qr = matrix.qr();
            let (q, triangular) = (qr.q(), qr.r());
            let k = q.ncols();
            let isometry = Array3::from_shape_fn((k, dp, dr), |(j, p, r)| q[(p * dr + r, j)]);
            let previous = &self.sites[y - 1];
            let (dl_previous, dp_previous, _) = previous.dim();
            let absorbed = Array3::from_shape_fn((dl_previous, dp_previous, k), |(l, p, j)| {
                (0..dl).map(|b| previous[[l, p, b]] * triangular[(j, b)]).sum::<f64>()
            });
            self.sites[y] = isometry;
            self.sites[y - 1] = absorbed;
            if !self.rescale_site(y - 1)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// canonicalize, then sweep bottom to top with SVDs keeping at most `chi` singular values per bond, and only
    /// those above `tol` times the largest
    pub fn truncate(&mut self, chi: usize, tol: Option<f64>) -> QecResult<()> {
        if self.log_scale == f64::NEG_INFINITY || self.sites.len() < 2 {
            return Ok(());
        }
        let chi = chi.max(1);
        let tol = tol.unwrap_or(0.);
        if tol == 0. && self.sites.iter().all(|site| site.dim().2 <= chi) {
            return Ok(());
        }
        self.right_canonicalize()?;
        if self.log_scale == f64::NEG_INFINITY {
            return Ok(());
        }
        for y in 0..self.sites.len() - 1 {
            let (dl, dp, dr) = self.sites[y].dim();
            let site = &self.sites[y];
            let matrix = DMatrix::from_fn(dl * dp, dr, |i, j| site[[i / dp, i % dp, j]]);
            let svd = matrix.svd(true, true);
            let (u, v_t) = match (svd.u, svd.v_t) {
                (Some(u), Some(v_t)) => (u, v_t),
                _ => return Err(QecError::DecodingFailure("singular value decomposition did not converge".to_string())),
            };
            let singular_values = svd.singular_values;
            let mut order: Vec<usize> = (0..singular_values.len()).collect();
            order.sort_by(|&a, &b| singular_values[b].total_cmp(&singular_values[a]));
            let largest = singular_values[order[0]];
            if !largest.is_finite() {
                return Err(QecError::DecodingFailure(format!("non-finite singular value {largest}")));
            }
            if largest == 0. {
                self.log_scale = f64::NEG_INFINITY;
                return Ok(());
            }
            let kept: Vec<usize> = order
                .iter()
                .copied()
                .take(chi)
                .enumerate()
                .take_while(|&(rank, index)| rank == 0 || singular_values[index] > tol * largest)
                .map(|(_, index)| index)
                .collect();
            let truncated = Array3::from_shape_fn((dl, dp, kept.len()), |(l, p, column)| u[(l * dp + p, kept[column])]);
            // fold S V^T into the next site
            let next = &self.sites[y + 1];
            let (_, dp_next, dr_next) = next.dim();
            let absorbed = Array3::from_shape_fn((kept.len(), dp_next, dr_next), |(row, p, r)| {
                let index = kept[row];
                singular_values[index] * (0..dr).map(|l| v_t[(index, l)] * next[[l, p, r]]).sum::<f64>()
            });
            self.sites[y] = truncated;
            self.sites[y + 1] = absorbed;
            if !self.rescale_site(y + 1)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// contract a fully absorbed MPS whose east legs are all trivial; a negative value, which only truncation can
    /// produce, is a [`QecError::DecodingFailure`] rather than a zero probability
    pub fn close(&self) -> QecResult<f64> {
        if self.log_scale == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        let mut vector = vec![1.];
        let mut log_value = self.log_scale;
        for site in self.sites.iter() {
            let (dl, dp, dr) = site.dim();
            assert_eq!(dp, 1, "east legs must be trivial before closing the MPS");
            assert_eq!(dl, vector.len());
            let mut next = vec![0.; dr];
            for (l, &value) in vector.iter().enumerate() {
                for (r, entry) in next.iter_mut().enumerate() {
                    *entry += value * site[[l, 0, r]];
                }
            }
            let max = next.iter().fold(0f64, |acc, v| acc.max(v.abs()));
            if !max.is_finite() || next.iter().any(|v| v.is_nan()) {
                return Err(QecError::DecodingFailure(format!("non-finite contraction value {max}")));
            }
            if max == 0. {
                return Ok(f64::NEG_INFINITY);
            }
            next.iter_mut().for_each(|v| *v /= max);
            log_value += max.ln();
            vector = next;
        }
        assert_eq!(vector.len(), 1, "north boundary bond must be trivial");
        let value = vector[0];
        if value.is_nan() {
            return Err(QecError::DecodingFailure("contraction evaluated to NaN".to_string()));
        }
        if value < 0. {
            return Err(QecError::DecodingFailure(format!(
                "truncated contraction evaluated to -exp({:.6})",
                log_value + (-value).ln()
            )));
        }
        if value == 0. {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(log_value + value.ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;
    use ndarray::Array;

    /// grid where every bond has dimension `bond` and every entry is `value`
    fn uniform_grid(width: usize, height: usize, bond: usize, value: f64) -> TensorGrid {
        let columns = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| {
                        let n = if y + 1 == height { 1 } else { bond };
                        let e = if x + 1 == width { 1 } else { bond };
                        let s = if y == 0 { 1 } else { bond };
                        let w = if x == 0 { 1 } else { bond };
                        Array::from_elem((n, e, s, w), value)
                    })
                    .collect()
            })
            .collect();
        TensorGrid::new(columns)
    }

    #[test]
    fn tensor_network_uniform_grid() {
        // cargo test tensor_network_uniform_grid -- --nocapture
        // every assignment of bond indices contributes value^(width * height)
        let (width, height, bond, value) = (3, 4, 2, 0.5);
        let grid = uniform_grid(width, height, bond, value);
        let bond_num = (width - 1) * height + width * (height - 1);
        let expected = (bond_num as f64) * (bond as f64).ln() + ((width * height) as f64) * value.ln();
        let exact = grid.contract(None, None).unwrap();
        assert!((exact - expected).abs() < 1e-9, "{exact} != {expected}");
        // the uniform network has rank one bonds, so truncation is exact
        let truncated = grid.contract(Some(1), None).unwrap();
        assert!((truncated - expected).abs() < 1e-9, "{truncated} != {expected}");
        let transposed = grid.transpose().contract(None, None).unwrap();
        assert!((transposed - expected).abs() < 1e-9, "{transposed} != {expected}");
    }

    /// grid of seeded random entries in `[0.1, 1)` with every inner bond of dimension `bond`
    fn random_grid(width: usize, height: usize, bond: usize, seed: u64) -> TensorGrid {
        let mut rng = DeterministicRng::seed_from_u64(seed);
        let columns = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| {
                        let n = if y + 1 == height { 1 } else { bond };
                        let e = if x + 1 == width { 1 } else { bond };
                        let s = if y == 0 { 1 } else { bond };
                        let w = if x == 0 { 1 } else { bond };
                        Array::from_shape_simple_fn((n, e, s, w), || 0.1 + 0.9 * rng.next_f64())
                    })
                    .collect()
            })
            .collect();
        TensorGrid::new(columns)
    }

    #[test]
    fn tensor_network_truncation_exact_within_rank() {
        // cargo test tensor_network_truncation_exact_within_rank -- --nocapture
        // four dangling legs of dimension 2 never need more than 4 singular values on any cut
        for seed in 0..5 {
            let grid = random_grid(5, 4, 2, seed);
            let exact = grid.contract(None, None).unwrap();
            let truncated = grid.contract(Some(4), None).unwrap();
            assert!((truncated - exact).abs() < 1e-9, "{truncated} != {exact}");
            let by_row = grid.transpose().contract(Some(4), None).unwrap();
            assert!((by_row - exact).abs() < 1e-9, "{by_row} != {exact}");
        }
    }

    #[test]
    fn tensor_network_right_canonical_form() {
        // cargo test tensor_network_right_canonical_form -- --nocapture
        let grid = random_grid(2, 5, 3, 42);
        let mut mps = Mps::from_first_column(&grid.columns[0]);
        mps.absorb_column(&grid.columns[1]);
        let before = mps.close().unwrap();
        mps.right_canonicalize().unwrap();
        let after = mps.close().unwrap();
        assert!((before - after).abs() < 1e-9, "{before} != {after}");
        for site in mps.sites.iter().skip(1) {
            let (dl, dp, dr) = site.dim();
            for a in 0..dl {
                for b in 0..dl {
                    let mut overlap = 0.;
                    for p in 0..dp {
                        for r in 0..dr {
                            overlap += site[[a, p, r]] * site[[b, p, r]];
                        }
                    }
                    let expected = if a == b { 1. } else { 0. };
                    assert!((overlap - expected).abs() < 1e-9, "site is not a right isometry: {overlap}");
                }
            }
        }
    }

    #[test]
    fn tensor_network_negative_truncated_value_is_failure() {
        // cargo test tensor_network_negative_truncated_value_is_failure -- --nocapture
        let mps = Mps {
            sites: vec![Array::from_elem((1, 1, 1), -0.5)],
            log_scale: 0.,
        };
        assert!(matches!(mps.close(), Err(QecError::DecodingFailure(_))));
        let mps = Mps {
            sites: vec![Array::from_elem((1, 1, 1), 0.)],
            log_scale: 0.,
        };
        assert_eq!(mps.close().unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn tensor_network_zero_network() {
        // cargo test tensor_network_zero_network -- --nocapture
        let grid = uniform_grid(2, 2, 2, 0.);
        assert_eq!(grid.contract(Some(4), None).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn tensor_network_nan_is_failure() {
        // cargo test tensor_network_nan_is_failure -- --nocapture
        let grid = uniform_grid(2, 2, 2, f64::NAN);
        assert!(matches!(grid.contract(None, None), Err(QecError::DecodingFailure(_))));
    }

    #[test]
    fn tensor_network_transpose_shapes() {
        // cargo test tensor_network_transpose_shapes -- --nocapture
        let grid = uniform_grid(3, 2, 2, 1.);
        let transposed = grid.transpose();
        assert_eq!(transposed.width, 2);
        assert_eq!(transposed.height, 3);
        transposed.sanity_check();
        let tensor = Array::from_shape_fn((2, 3, 4, 5), |(n, e, s, w)| (n * 1000 + e * 100 + s * 10 + w) as f64);
        let reflected = tensor.view().permuted_axes([EAST, NORTH, WEST, SOUTH]).to_owned();
        assert_eq!(reflected.shape(), &[3, 2, 5, 4]);
        assert_eq!(reflected[[2, 1, 4, 3]], tensor[[1, 2, 3, 4]]);
    }
}
