//! Seed time cut, with cross-talk window extensions.
//!
//! A seed candidate below the significance upper limit whose |time|
//! exceeds the threshold fails seeding. Near an energetic neighbor the
//! window widens to absorb electronics cross-talk: direct (and
//! optionally second) phi-neighbors in the second EM layers, and
//! previous-sampling neighbors for third-layer cells.

use topocal_core::{CellRecord, ClusteringConfig};
use topocal_geometry::{CellNeighborIndex, NeighborCategory, NeighborMask};

/// True if an energetic cell sits in one of the configured cross-talk
/// positions relative to `cell`.
fn has_energetic_xtalk_neighbor(
    cell: usize,
    neighbors: &CellNeighborIndex,
    cells: &[CellRecord],
    sampling_is_em2: bool,
    sampling_is_em3: bool,
    config: &ClusteringConfig,
) -> bool {
    let threshold = config.xtalk_energy_threshold_mev;
    let energetic = |index: usize| cells[index].energy.abs() >= threshold;

    if sampling_is_em2 && (config.xtalk_em2 || config.xtalk_em2_second) {
        for category in [NeighborCategory::PrevInPhi, NeighborCategory::NextInPhi] {
            for direct in neighbors.neighbors_collect(cell, NeighborMask::single(category)) {
                if config.xtalk_em2 && energetic(direct as usize) {
                    return true;
                }
                if config.xtalk_em2_second {
                    // Second neighbor: one more step in the same phi direction.
                    for second in neighbors
                        .neighbors_collect(direct as usize, NeighborMask::single(category))
                    {
                        if energetic(second as usize) {
                            return true;
                        }
                    }
                }
            }
        }
    }

    if sampling_is_em3 && config.xtalk_em3 {
        for previous in
            neighbors.neighbors_collect(cell, NeighborMask::single(NeighborCategory::PrevInSamp))
        {
            if energetic(previous as usize) {
                return true;
            }
        }
    }

    false
}

/// Applies the seed time cut to one candidate.
///
/// `significance_abs` is the candidate's absolute significance; above the
/// configured upper limit the cut is waived entirely.
pub fn passes_seed_time_cut(
    cell: usize,
    record: &CellRecord,
    significance_abs: f32,
    neighbors: &CellNeighborIndex,
    cells: &[CellRecord],
    sampling_is_em2: bool,
    sampling_is_em3: bool,
    config: &ClusteringConfig,
) -> bool {
    if !config.seed_cuts_in_t {
        return true;
    }
    if config.use_time_cut_upper_limit && significance_abs > config.time_cut_upper_limit_sigma {
        return true;
    }
    let time_abs = record.time.abs();
    if time_abs <= config.seed_time_threshold_ns {
        return true;
    }
    if time_abs <= config.seed_time_threshold_ns + config.xtalk_delta_t_ns
        && has_energetic_xtalk_neighbor(
            cell,
            neighbors,
            cells,
            sampling_is_em2,
            sampling_is_em3,
            config,
        )
    {
        return true;
    }
    false
}
