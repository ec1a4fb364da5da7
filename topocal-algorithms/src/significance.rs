//! Parallel per-cell significance evaluation.

use rayon::prelude::*;
use topocal_core::{CellRecord, NoiseTable};
use topocal_geometry::DetectorGeometry;

/// Per-cell significance and eligibility, computed once per pass.
#[derive(Debug, Clone, Copy)]
pub struct CellLevel {
    /// Signed significance `E / sigma_eff`.
    pub significance: f32,
    /// False for bad-quality or otherwise malformed cells; such cells
    /// never seed, grow or join a cluster.
    pub usable: bool,
    /// Cell sits in a sampling exempt from noise cuts.
    pub noise_exempt: bool,
}

/// Evaluates every cell's significance in parallel.
///
/// There is no ordering dependency here; the result is a pure function
/// of the inputs.
pub fn evaluate(
    geometry: &DetectorGeometry,
    cells: &[CellRecord],
    noise: &NoiseTable,
    two_gaussian_noise: bool,
) -> Vec<CellLevel> {
    let two_gaussian_region = noise.two_gaussian_subdetector();
    (0..cells.len())
        .into_par_iter()
        .map(|cell| {
            let record = &cells[cell];
            let descriptor = geometry.descriptor(cell);
            let usable = !record.is_bad() && record.energy.is_finite() && record.time.is_finite();
            let two_gaussian =
                two_gaussian_noise && descriptor.sampling.subdetector() == two_gaussian_region;
            let significance =
                noise.significance(cell, record.gain, record.energy, two_gaussian);
            CellLevel {
                significance,
                usable,
                noise_exempt: descriptor.sampling.is_noise_exempt(),
            }
        })
        .collect()
}

/// Applies one significance threshold, on `E` or `|E|`.
#[inline]
pub fn passes(significance: f32, threshold: f32, in_abs: bool) -> bool {
    let value = if in_abs {
        significance.abs()
    } else {
        significance
    };
    value >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use topocal_core::{GainState, QualityProvenance, Sampling};
    use topocal_geometry::CellDescriptor;

    fn two_cell_geometry() -> DetectorGeometry {
        let mut builder = DetectorGeometry::builder();
        builder.add_cell(CellDescriptor::new(Sampling::EMB2, 0.0, 0.0, 0.025, 0.025));
        builder.add_cell(CellDescriptor::new(Sampling::TileBar0, 0.1, 0.0, 0.1, 0.1));
        builder.build().unwrap()
    }

    #[test]
    fn test_evaluate_marks_bad_cells_unusable() {
        let geometry = two_cell_geometry();
        let mut noise = NoiseTable::new(2);
        noise.set_sigma(0, GainState::High, 100.0).unwrap();
        noise.set_sigma(1, GainState::High, 100.0).unwrap();

        let mut bad = CellRecord::new(500.0, 0.0, GainState::High);
        bad.quality = QualityProvenance(QualityProvenance::MASKED_BAD);
        let cells = vec![CellRecord::new(500.0, 0.0, GainState::High), bad];

        let levels = evaluate(&geometry, &cells, &noise, false);
        assert!(levels[0].usable);
        assert!(!levels[1].usable);
        assert!((levels[0].significance - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_two_gaussian_only_in_tile() {
        let geometry = two_cell_geometry();
        let mut noise = NoiseTable::new(2);
        for cell in 0..2 {
            noise.set_sigma(cell, GainState::High, 50.0).unwrap();
            noise
                .set_second_gaussian(cell, GainState::High, 200.0, 0.2)
                .unwrap();
        }
        let cells = vec![
            CellRecord::new(400.0, 0.0, GainState::High),
            CellRecord::new(400.0, 0.0, GainState::High),
        ];

        let levels = evaluate(&geometry, &cells, &noise, true);
        // EMB cell keeps the single-Gaussian sigma, Tile cell widens.
        assert!((levels[0].significance - 8.0).abs() < 1e-6);
        assert!(levels[1].significance < 8.0);
    }

    #[test]
    fn test_threshold_boundary_inclusive() {
        assert!(passes(2.0, 2.0, true));
        assert!(passes(-2.0, 2.0, true));
        assert!(!passes(-2.0, 2.0, false));
        assert!(!passes(1.999, 2.0, true));
    }
}
