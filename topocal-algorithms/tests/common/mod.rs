//! Shared toy-geometry helpers for the integration tests.
#![allow(dead_code)]

use topocal_core::{CellRecord, GainState, NoiseTable, Sampling};
use topocal_geometry::{CellDescriptor, DetectorGeometry, NeighborCategory};

/// Noise sigma used by all toy setups, in MeV.
pub const SIGMA: f32 = 100.0;

/// Chain of cells along eta, one per sampling entry. Consecutive cells of
/// the same sampling are linked in eta; a sampling change is linked as a
/// next/previous-in-sampling pair.
pub fn chain(samplings: &[Sampling]) -> DetectorGeometry {
    chain_with_restrictions(samplings, false, false)
}

/// Same as [`chain`] with the neighbor restriction policies chosen.
pub fn chain_with_restrictions(
    samplings: &[Sampling],
    restrict_hec_iw_and_fcal: bool,
    restrict_presampler: bool,
) -> DetectorGeometry {
    let mut builder = DetectorGeometry::builder();
    let mut cells = Vec::new();
    for (i, &sampling) in samplings.iter().enumerate() {
        cells.push(builder.add_cell(CellDescriptor::new(
            sampling,
            0.025 * i as f32,
            0.0,
            0.025,
            0.025,
        )));
    }
    for i in 0..samplings.len().saturating_sub(1) {
        let (a, b) = (cells[i], cells[i + 1]);
        if samplings[i] == samplings[i + 1] {
            builder.add_neighbor(a, NeighborCategory::NextInEta, b);
            builder.add_neighbor(b, NeighborCategory::PrevInEta, a);
        } else {
            builder.add_neighbor(a, NeighborCategory::NextInSamp, b);
            builder.add_neighbor(b, NeighborCategory::PrevInSamp, a);
        }
    }
    builder
        .restrict_hec_iw_and_fcal_neighbors(restrict_hec_iw_and_fcal)
        .restrict_presampler_neighbors(restrict_presampler)
        .build()
        .unwrap()
}

/// Chain of `n` second-EM-layer cells.
pub fn emb2_chain(n: usize) -> DetectorGeometry {
    chain(&vec![Sampling::EMB2; n])
}

/// Geometry of `n` cells with no neighbor relations at all.
pub fn isolated_cells(n: usize) -> DetectorGeometry {
    let mut builder = DetectorGeometry::builder();
    for i in 0..n {
        builder.add_cell(CellDescriptor::new(
            Sampling::EMB2,
            -2.5 + 5.0 * (i as f32 / n as f32),
            0.0,
            0.025,
            0.025,
        ));
    }
    builder.build().unwrap()
}

/// Flat noise table: [`SIGMA`] for every cell and gain.
pub fn uniform_noise(n: usize) -> NoiseTable {
    let mut noise = NoiseTable::new(n);
    for cell in 0..n {
        for gain in [
            GainState::High,
            GainState::Medium,
            GainState::Low,
            GainState::MediumHigh,
        ] {
            noise.set_sigma(cell, gain, SIGMA).unwrap();
        }
    }
    noise
}

/// In-time records with the given significances (in units of [`SIGMA`]).
pub fn records(significances: &[f32]) -> Vec<CellRecord> {
    significances
        .iter()
        .map(|s| CellRecord::new(s * SIGMA, 0.0, GainState::High))
        .collect()
}
