//! Per-cell, per-gain noise levels and significance evaluation.

use crate::cell::{GainState, NUM_GAINS};
use crate::error::{Error, Result};
use crate::sampling::Subdetector;

/// Noise sigma per cell per gain state, with an optional second Gaussian
/// component for the subsystem running the two-component model.
///
/// Built once per conditions interval; read-only during clustering.
#[derive(Debug, Clone)]
pub struct NoiseTable {
    n_cells: usize,
    /// Primary sigma, `n_cells * NUM_GAINS`, cell-major.
    sigma: Vec<f32>,
    /// Second-component sigma; zero entries mean "no second component".
    sigma2: Vec<f32>,
    /// Relative normalization of the second component.
    ratio2: Vec<f32>,
    /// Subdetector the two-Gaussian model applies to when enabled.
    two_gaussian_subdetector: Subdetector,
}

impl NoiseTable {
    /// Creates a table for `n_cells` cells with all sigmas zero.
    pub fn new(n_cells: usize) -> Self {
        Self {
            n_cells,
            sigma: vec![0.0; n_cells * NUM_GAINS],
            sigma2: vec![0.0; n_cells * NUM_GAINS],
            ratio2: vec![0.0; n_cells * NUM_GAINS],
            two_gaussian_subdetector: Subdetector::Tile,
        }
    }

    /// Number of cells the table covers.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_cells
    }

    /// True if the table covers no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_cells == 0
    }

    /// Subdetector the two-Gaussian model applies to.
    #[inline]
    pub fn two_gaussian_subdetector(&self) -> Subdetector {
        self.two_gaussian_subdetector
    }

    #[inline]
    fn slot(&self, cell: usize, gain: GainState) -> usize {
        cell * NUM_GAINS + gain.index()
    }

    /// Sets the primary sigma for one cell and gain.
    pub fn set_sigma(&mut self, cell: usize, gain: GainState, sigma: f32) -> Result<()> {
        if cell >= self.n_cells {
            return Err(Error::GeometrySizeMismatch {
                expected: self.n_cells,
                got: cell + 1,
            });
        }
        let slot = self.slot(cell, gain);
        self.sigma[slot] = sigma;
        Ok(())
    }

    /// Sets the second Gaussian component for one cell and gain.
    ///
    /// `ratio` is the normalization of the second component relative to
    /// the first.
    pub fn set_second_gaussian(
        &mut self,
        cell: usize,
        gain: GainState,
        sigma: f32,
        ratio: f32,
    ) -> Result<()> {
        if cell >= self.n_cells {
            return Err(Error::GeometrySizeMismatch {
                expected: self.n_cells,
                got: cell + 1,
            });
        }
        let slot = self.slot(cell, gain);
        self.sigma2[slot] = sigma;
        self.ratio2[slot] = ratio;
        Ok(())
    }

    /// Primary sigma for one cell and gain.
    #[inline]
    pub fn sigma(&self, cell: usize, gain: GainState) -> f32 {
        self.sigma[self.slot(cell, gain)]
    }

    /// Effective sigma for one cell and gain.
    ///
    /// Under the single-Gaussian model this is the stored sigma. Under the
    /// two-Gaussian model it is the width of the single Gaussian whose
    /// two-sided tail probability at `|energy|` matches the mixture's.
    pub fn effective_sigma(
        &self,
        cell: usize,
        gain: GainState,
        energy: f32,
        two_gaussian: bool,
    ) -> f32 {
        let slot = self.slot(cell, gain);
        let s1 = self.sigma[slot];
        if !two_gaussian {
            return s1;
        }
        let s2 = self.sigma2[slot];
        let ratio = self.ratio2[slot];
        if s2 <= 0.0 || ratio <= 0.0 || s1 <= 0.0 {
            return s1;
        }
        equivalent_gaussian_sigma(f64::from(energy).abs(), s1.into(), s2.into(), ratio.into())
            as f32
    }

    /// Signed significance `energy / sigma_eff` for one cell and gain.
    ///
    /// Returns 0 when the effective sigma is not positive (undescribed
    /// channel); such cells never pass a positive threshold.
    pub fn significance(
        &self,
        cell: usize,
        gain: GainState,
        energy: f32,
        two_gaussian: bool,
    ) -> f32 {
        let sigma = self.effective_sigma(cell, gain, energy, two_gaussian);
        if sigma > 0.0 {
            energy / sigma
        } else {
            0.0
        }
    }
}

/// Width of the single zero-mean Gaussian whose two-sided tail probability
/// at `e >= 0` equals that of the mixture `N(0,s1) + ratio * N(0,s2)`.
///
/// The result always lies between `min(s1, s2)` and `max(s1, s2)`; it is
/// found by bisection on the (monotonic) single-Gaussian tail.
fn equivalent_gaussian_sigma(e: f64, s1: f64, s2: f64, ratio: f64) -> f64 {
    if (s1 - s2).abs() < 1e-12 || e == 0.0 {
        return s1;
    }
    let tail = (erfc(e / (s1 * std::f64::consts::SQRT_2))
        + ratio * erfc(e / (s2 * std::f64::consts::SQRT_2)))
        / (1.0 + ratio);

    let mut lo = s1.min(s2);
    let mut hi = s1.max(s2);
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        let mid_tail = erfc(e / (mid * std::f64::consts::SQRT_2));
        if mid_tail < tail {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-9 * hi {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Complementary error function (Abramowitz & Stegun 7.1.26, |err| < 1.5e-7).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * z);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let result = poly * (-z * z).exp();
    if x >= 0.0 {
        result
    } else {
        2.0 - result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigma_storage_per_gain() {
        let mut table = NoiseTable::new(4);
        table.set_sigma(2, GainState::High, 50.0).unwrap();
        table.set_sigma(2, GainState::Low, 120.0).unwrap();

        assert_relative_eq!(table.sigma(2, GainState::High), 50.0);
        assert_relative_eq!(table.sigma(2, GainState::Low), 120.0);
        assert_relative_eq!(table.sigma(2, GainState::Medium), 0.0);
    }

    #[test]
    fn test_out_of_range_cell_rejected() {
        let mut table = NoiseTable::new(2);
        assert!(table.set_sigma(2, GainState::High, 1.0).is_err());
    }

    #[test]
    fn test_significance_signed() {
        let mut table = NoiseTable::new(1);
        table.set_sigma(0, GainState::High, 100.0).unwrap();

        assert_relative_eq!(table.significance(0, GainState::High, 400.0, false), 4.0);
        assert_relative_eq!(table.significance(0, GainState::High, -250.0, false), -2.5);
    }

    #[test]
    fn test_zero_sigma_gives_zero_significance() {
        let table = NoiseTable::new(1);
        assert_relative_eq!(table.significance(0, GainState::High, 1000.0, false), 0.0);
    }

    #[test]
    fn test_two_gaussian_reduces_to_single_when_equal() {
        let mut table = NoiseTable::new(1);
        table.set_sigma(0, GainState::High, 80.0).unwrap();
        table
            .set_second_gaussian(0, GainState::High, 80.0, 0.3)
            .unwrap();

        let eff = table.effective_sigma(0, GainState::High, 300.0, true);
        assert_relative_eq!(eff, 80.0, epsilon = 1e-4);
    }

    #[test]
    fn test_two_gaussian_between_components() {
        let mut table = NoiseTable::new(1);
        table.set_sigma(0, GainState::High, 50.0).unwrap();
        table
            .set_second_gaussian(0, GainState::High, 200.0, 0.1)
            .unwrap();

        let eff = table.effective_sigma(0, GainState::High, 400.0, true);
        assert!(eff > 50.0 && eff < 200.0, "effective sigma {eff} out of range");

        // Disabled flag falls back to the primary component.
        let plain = table.effective_sigma(0, GainState::High, 400.0, false);
        assert_relative_eq!(plain, 50.0);
    }

    #[test]
    fn test_two_gaussian_widens_with_tail_weight() {
        let mut table = NoiseTable::new(2);
        for cell in 0..2 {
            table.set_sigma(cell, GainState::High, 50.0).unwrap();
        }
        table
            .set_second_gaussian(0, GainState::High, 200.0, 0.05)
            .unwrap();
        table
            .set_second_gaussian(1, GainState::High, 200.0, 0.5)
            .unwrap();

        let light = table.effective_sigma(0, GainState::High, 400.0, true);
        let heavy = table.effective_sigma(1, GainState::High, 400.0, true);
        assert!(heavy > light);
    }
}
