//! (eta, phi) to cell reverse lookup, one 2-D angular grid per sampling.
//!
//! Footprint-respecting grids record how far each cell stretches into
//! every bucket it overlaps; nearest-cell grids register centers only and
//! pave the remaining buckets with a bounded two-pass flood fill.

use topocal_core::{CellIndex, Sampling};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed number of overlap entries per grid bucket.
///
/// Registrations beyond the capacity are dropped and counted, never
/// fatal.
pub const BUCKET_CAPACITY: usize = 10;

const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

/// Smallest angular difference `a - b`, wrapped into `[-pi, pi)`.
fn angular_difference(a: f32, b: f32) -> f32 {
    let mut diff = a - b;
    while diff >= std::f32::consts::PI {
        diff -= TWO_PI;
    }
    while diff < -std::f32::consts::PI {
        diff += TWO_PI;
    }
    diff
}

/// Geometry of one sampling's grid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridSpec {
    /// Number of eta subdivisions (per half for split grids).
    pub eta_bins: usize,
    /// Number of phi subdivisions.
    pub phi_bins: usize,
    /// Lower eta bound; for split grids, of the positive half.
    pub eta_min: f32,
    /// Upper eta bound; for split grids, of the positive half.
    pub eta_max: f32,
    /// Lower phi bound.
    pub phi_min: f32,
    /// Upper phi bound.
    pub phi_max: f32,
    /// Footprint mode: cells stretch only as far as their deta/dphi.
    /// Otherwise the grid always answers with the closest cell.
    pub respect_deltas: bool,
    /// Split into independent positive/negative eta halves (the negative
    /// half mirrors the configured eta bounds).
    pub split_eta: bool,
}

impl GridSpec {
    /// Footprint-respecting grid covering `[eta_min, eta_max]` continuously.
    pub fn footprint(eta_bins: usize, phi_bins: usize, eta_min: f32, eta_max: f32) -> Self {
        Self {
            eta_bins,
            phi_bins,
            eta_min,
            eta_max,
            phi_min: -std::f32::consts::PI,
            phi_max: std::f32::consts::PI,
            respect_deltas: true,
            split_eta: false,
        }
    }

    /// Nearest-cell grid covering `[eta_min, eta_max]` continuously.
    pub fn nearest(eta_bins: usize, phi_bins: usize, eta_min: f32, eta_max: f32) -> Self {
        Self {
            respect_deltas: false,
            ..Self::footprint(eta_bins, phi_bins, eta_min, eta_max)
        }
    }

    /// Splits the grid into independent positive/negative eta halves.
    #[must_use]
    pub fn with_split_eta(mut self) -> Self {
        self.split_eta = true;
        self
    }
}

/// Build-time diagnostics of the spatial lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialBuildStatistics {
    /// Bucket entries successfully stored.
    pub registrations: u64,
    /// Registrations dropped because a bucket was full.
    pub dropped_overflow: u64,
    /// Registrations rejected outright (out of bounds, or a footprint
    /// narrower than one bucket).
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Slot {
    cell: i32,
    /// Footprint mode: signed eta fraction marker (positive = the cell
    /// ends at this fraction, negative = starts there, zero = covers the
    /// bucket). Nearest mode: the cell's center eta.
    mark_eta: f32,
    /// Phi counterpart of `mark_eta`.
    mark_phi: f32,
}

const EMPTY_SLOT: Slot = Slot {
    cell: -1,
    mark_eta: 0.0,
    mark_phi: 0.0,
};

/// One contiguous grid half.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Pane {
    eta_min: f32,
    eta_max: f32,
    phi_min: f32,
    phi_max: f32,
    delta_eta: f32,
    delta_phi: f32,
    eta_bins: usize,
    phi_bins: usize,
    slots: Vec<Slot>,
}

impl Pane {
    fn new(eta_min: f32, eta_max: f32, phi_min: f32, phi_max: f32, eta_bins: usize, phi_bins: usize) -> Self {
        Self {
            eta_min,
            eta_max,
            phi_min,
            phi_max,
            delta_eta: (eta_max - eta_min) / eta_bins as f32,
            delta_phi: (phi_max - phi_min) / phi_bins as f32,
            eta_bins,
            phi_bins,
            slots: vec![EMPTY_SLOT; eta_bins * phi_bins * BUCKET_CAPACITY],
        }
    }

    /// Bin index plus the fractional position inside the bin.
    fn eta_coordinate(&self, eta: f32) -> (isize, f32) {
        let frac = (eta - self.eta_min) / self.delta_eta;
        let rounded = frac.floor();
        (rounded as isize, frac - rounded)
    }

    fn phi_coordinate(&self, phi: f32) -> (isize, f32) {
        let frac = (phi - self.phi_min) / self.delta_phi;
        let rounded = frac.floor();
        (rounded as isize, frac - rounded)
    }

    #[inline]
    fn bucket(&self, eta_c: usize, phi_c: usize) -> &[Slot] {
        let start = (eta_c * self.phi_bins + phi_c) * BUCKET_CAPACITY;
        &self.slots[start..start + BUCKET_CAPACITY]
    }

    fn add_to_bucket(
        &mut self,
        eta_c: usize,
        phi_c: usize,
        cell: CellIndex,
        mark_eta: f32,
        mark_phi: f32,
        stats: &mut SpatialBuildStatistics,
    ) {
        let start = (eta_c * self.phi_bins + phi_c) * BUCKET_CAPACITY;
        for slot in &mut self.slots[start..start + BUCKET_CAPACITY] {
            if slot.cell == cell as i32 {
                return;
            }
            if slot.cell < 0 {
                *slot = Slot {
                    cell: cell as i32,
                    mark_eta,
                    mark_phi,
                };
                stats.registrations += 1;
                return;
            }
        }
        stats.dropped_overflow += 1;
    }

    /// Registers a cell footprint `(eta +- deta/2, phi +- dphi/2)` into
    /// every bucket it intersects, wrapping phi at the circle boundary.
    fn register_footprint(
        &mut self,
        cell: CellIndex,
        eta: f32,
        phi: f32,
        deta: f32,
        dphi: f32,
        stats: &mut SpatialBuildStatistics,
    ) {
        let bins = self.phi_bins as isize;
        let (eta_start, eta_frac_start) = self.eta_coordinate(eta - deta / 2.0);
        let (eta_end, eta_frac_end) = self.eta_coordinate(eta + deta / 2.0);
        let (phi_start, phi_frac_start) = self.phi_coordinate(phi - dphi / 2.0);
        let (phi_end, phi_frac_end) = self.phi_coordinate(phi + dphi / 2.0);
        let (phi_extra_neg, phi_frac_extra_neg) = self.phi_coordinate(phi + dphi / 2.0 - TWO_PI);
        let (phi_extra_pos, phi_frac_extra_pos) = self.phi_coordinate(phi - dphi / 2.0 + TWO_PI);

        // A footprint crossing +pi spills its end into the low buckets; one
        // crossing -pi spills its start into the high buckets.
        let wraps_high = self.wraps_phi() && phi_extra_neg >= 0;
        let wraps_low = self.wraps_phi() && phi_extra_pos < bins;

        // A footprint narrower than one bucket cannot be represented by
        // fraction markers.
        if (eta_start == eta_end && (eta_frac_start > 0.0 || eta_frac_end < 1.0))
            || (!wraps_high
                && !wraps_low
                && phi_start == phi_end
                && (phi_frac_start > 0.0 || phi_frac_end < 1.0))
        {
            stats.rejected += 1;
            return;
        }
        if eta_start < 0 || eta_end as usize >= self.eta_bins {
            stats.rejected += 1;
            return;
        }
        if (phi_start < 0 && !wraps_low) || (phi_end >= bins && !wraps_high) {
            stats.rejected += 1;
            return;
        }

        let phi_main_start = phi_start.max(0);
        let phi_main_end = phi_end.min(bins - 1);

        for eta_c in eta_start..=eta_end {
            let mark_eta = if eta_c == eta_start {
                -eta_frac_start
            } else if eta_c == eta_end {
                eta_frac_end
            } else {
                0.0
            };

            // Wrapped tail of a footprint crossing +pi.
            if wraps_high {
                for phi_c in 0..=phi_extra_neg.min(bins - 1) {
                    let mark_phi = if phi_c == phi_extra_neg {
                        phi_frac_extra_neg
                    } else {
                        0.0
                    };
                    self.add_to_bucket(eta_c as usize, phi_c as usize, cell, mark_eta, mark_phi, stats);
                }
            }
            for phi_c in phi_main_start..=phi_main_end {
                let mark_phi = if phi_c == phi_start {
                    -phi_frac_start
                } else if phi_c == phi_end {
                    phi_frac_end
                } else {
                    0.0
                };
                self.add_to_bucket(eta_c as usize, phi_c as usize, cell, mark_eta, mark_phi, stats);
            }
            // Wrapped tail of a footprint crossing -pi.
            if wraps_low {
                for phi_c in phi_extra_pos.max(0)..bins {
                    let mark_phi = if phi_c == phi_extra_pos {
                        -phi_frac_extra_pos
                    } else {
                        0.0
                    };
                    self.add_to_bucket(eta_c as usize, phi_c as usize, cell, mark_eta, mark_phi, stats);
                }
            }
        }
    }

    /// Registers only the bucket containing the cell center.
    fn register_center(
        &mut self,
        cell: CellIndex,
        eta: f32,
        phi: f32,
        stats: &mut SpatialBuildStatistics,
    ) {
        let (eta_c, _) = self.eta_coordinate(eta);
        let (phi_c, _) = self.phi_coordinate(phi);
        if eta_c < 0 || eta_c as usize >= self.eta_bins || phi_c < 0 || phi_c as usize >= self.phi_bins
        {
            stats.rejected += 1;
            return;
        }
        self.add_to_bucket(eta_c as usize, phi_c as usize, cell, eta, phi, stats);
    }

    fn wraps_phi(&self) -> bool {
        self.phi_max - self.phi_min >= TWO_PI - 1e-4
    }

    /// One flood-fill sweep over a snapshot of the grid.
    ///
    /// `unique_only` restricts sources to uniquely-resolved buckets and
    /// propagates their single cell; otherwise every resolved bucket
    /// propagates all of its cells. Targets must be empty in the
    /// snapshot. Returns whether anything was added.
    fn flood_sweep(&mut self, unique_only: bool, stats: &mut SpatialBuildStatistics) -> bool {
        let snapshot = self.slots.clone();
        let wrap = self.wraps_phi();
        let mut progress = false;

        for eta_c in 0..self.eta_bins {
            for phi_c in 0..self.phi_bins {
                let start = (eta_c * self.phi_bins + phi_c) * BUCKET_CAPACITY;
                let source = &snapshot[start..start + BUCKET_CAPACITY];
                if source[0].cell < 0 {
                    continue;
                }
                if unique_only && source[1].cell >= 0 {
                    continue;
                }

                for delta_eta in -1isize..=1 {
                    let target_eta = eta_c as isize + delta_eta;
                    if target_eta < 0 || target_eta as usize >= self.eta_bins {
                        continue;
                    }
                    for delta_phi in -1isize..=1 {
                        if delta_eta == 0 && delta_phi == 0 {
                            continue;
                        }
                        let mut target_phi = phi_c as isize + delta_phi;
                        if target_phi < 0 || target_phi as usize >= self.phi_bins {
                            if !wrap {
                                continue;
                            }
                            target_phi = target_phi.rem_euclid(self.phi_bins as isize);
                        }
                        let target_start = (target_eta as usize * self.phi_bins
                            + target_phi as usize)
                            * BUCKET_CAPACITY;
                        if snapshot[target_start].cell >= 0 {
                            continue;
                        }
                        for slot in source {
                            if slot.cell < 0 {
                                break;
                            }
                            let before = stats.registrations;
                            self.add_to_bucket(
                                target_eta as usize,
                                target_phi as usize,
                                slot.cell as CellIndex,
                                slot.mark_eta,
                                slot.mark_phi,
                                stats,
                            );
                            progress |= stats.registrations > before;
                            if unique_only {
                                break;
                            }
                        }
                    }
                }
            }
        }
        progress
    }

    /// Paves empty buckets from their resolved neighbors: first from
    /// uniquely-resolved buckets until that pass stalls, then from any
    /// resolved bucket.
    fn flood_fill(&mut self, stats: &mut SpatialBuildStatistics) {
        while self.flood_sweep(true, stats) {}
        while self.flood_sweep(false, stats) {}
    }

    fn in_bounds(&self, eta: f32, phi: f32) -> Option<(usize, usize, f32, f32)> {
        let (eta_c, eta_frac) = self.eta_coordinate(eta);
        let (phi_c, phi_frac) = self.phi_coordinate(phi);
        if eta < self.eta_min
            || eta > self.eta_max
            || phi < self.phi_min
            || phi > self.phi_max
            || eta_c < 0
            || eta_c as usize >= self.eta_bins
            || phi_c < 0
            || phi_c as usize >= self.phi_bins
        {
            return None;
        }
        Some((eta_c as usize, phi_c as usize, eta_frac, phi_frac))
    }

    /// True if the fractional position is inside the span marked by a
    /// signed fraction marker.
    fn covers(test: f32, mark: f32) -> bool {
        if mark > 0.0 {
            test.abs() <= mark.abs()
        } else if mark < 0.0 {
            test.abs() >= mark.abs()
        } else {
            true
        }
    }

    fn candidates_footprint(&self, eta: f32, phi: f32, out: &mut Vec<CellIndex>) {
        let Some((eta_c, phi_c, eta_frac, phi_frac)) = self.in_bounds(eta, phi) else {
            return;
        };
        for slot in self.bucket(eta_c, phi_c) {
            if slot.cell < 0 {
                break;
            }
            if Self::covers(eta_frac, slot.mark_eta) && Self::covers(phi_frac, slot.mark_phi) {
                out.push(slot.cell as CellIndex);
            }
        }
    }

    fn nearest(&self, eta: f32, phi: f32) -> Option<CellIndex> {
        let (eta_c, phi_c, _, _) = self.in_bounds(eta, phi)?;
        let mut best: Option<(f32, i32)> = None;
        for slot in self.bucket(eta_c, phi_c) {
            if slot.cell < 0 {
                break;
            }
            let delta_eta = slot.mark_eta - eta;
            let delta_phi = angular_difference(slot.mark_phi, phi);
            let distance = delta_eta * delta_eta + delta_phi * delta_phi;
            let better = match best {
                None => true,
                Some((best_distance, best_cell)) => {
                    distance < best_distance
                        || (distance == best_distance && slot.cell > best_cell)
                }
            };
            if better {
                best = Some((distance, slot.cell));
            }
        }
        best.map(|(_, cell)| cell as CellIndex)
    }

    fn has_cell(&self, eta: f32, phi: f32, respect_deltas: bool) -> bool {
        if respect_deltas {
            let mut out = Vec::with_capacity(1);
            self.candidates_footprint(eta, phi, &mut out);
            !out.is_empty()
        } else {
            // Except for being out of bounds, a nearest-cell pane always
            // resolves some cell once paved.
            self.nearest(eta, phi).is_some()
        }
    }
}

/// The grid (or pair of half-grids) of one sampling.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplingGrid {
    respect_deltas: bool,
    positive: Pane,
    negative: Option<Pane>,
}

impl SamplingGrid {
    fn new(spec: GridSpec) -> Self {
        let positive = Pane::new(
            spec.eta_min,
            spec.eta_max,
            spec.phi_min,
            spec.phi_max,
            spec.eta_bins,
            spec.phi_bins,
        );
        let negative = spec.split_eta.then(|| {
            Pane::new(
                -spec.eta_max,
                -spec.eta_min,
                spec.phi_min,
                spec.phi_max,
                spec.eta_bins,
                spec.phi_bins,
            )
        });
        Self {
            respect_deltas: spec.respect_deltas,
            positive,
            negative,
        }
    }

    fn pane_for(&self, eta: f32) -> &Pane {
        match &self.negative {
            Some(negative) if eta < 0.0 => negative,
            _ => &self.positive,
        }
    }

    fn pane_for_mut(&mut self, eta: f32) -> &mut Pane {
        match &mut self.negative {
            Some(negative) if eta < 0.0 => negative,
            _ => &mut self.positive,
        }
    }

    fn register_cell(
        &mut self,
        cell: CellIndex,
        eta: f32,
        phi: f32,
        deta: f32,
        dphi: f32,
        stats: &mut SpatialBuildStatistics,
    ) {
        let respect_deltas = self.respect_deltas;
        let pane = self.pane_for_mut(eta);
        if respect_deltas {
            pane.register_footprint(cell, eta, phi, deta, dphi, stats);
        } else {
            pane.register_center(cell, eta, phi, stats);
        }
    }

    fn finish(&mut self, stats: &mut SpatialBuildStatistics) {
        if !self.respect_deltas {
            self.positive.flood_fill(stats);
            if let Some(negative) = &mut self.negative {
                negative.flood_fill(stats);
            }
        }
    }

    fn candidates(&self, eta: f32, phi: f32, out: &mut Vec<CellIndex>) {
        let pane = self.pane_for(eta);
        if self.respect_deltas {
            pane.candidates_footprint(eta, phi, out);
        } else if let Some(cell) = pane.nearest(eta, phi) {
            out.push(cell);
        }
    }

    fn nearest(&self, eta: f32, phi: f32) -> Option<CellIndex> {
        if self.respect_deltas {
            return None;
        }
        self.pane_for(eta).nearest(eta, phi)
    }

    fn has_cell(&self, eta: f32, phi: f32) -> bool {
        self.pane_for(eta).has_cell(eta, phi, self.respect_deltas)
    }
}

/// Per-sampling (eta, phi) to cell lookup.
///
/// Built once from the geometry, then read-only.
#[derive(Debug, Clone)]
pub struct SpatialLookup {
    grids: Vec<Option<SamplingGrid>>,
    stats: SpatialBuildStatistics,
}

impl SpatialLookup {
    /// Candidate cells of one sampling at the given coordinates.
    ///
    /// Footprint grids return every cell whose stored span covers the
    /// query; nearest-cell grids return at most the single closest cell.
    /// Queries outside the registered bounds, or on samplings without a
    /// grid, return nothing.
    pub fn candidate_cells(&self, sampling: Sampling, eta: f32, phi: f32) -> Vec<CellIndex> {
        let mut out = Vec::with_capacity(BUCKET_CAPACITY);
        if let Some(grid) = self.grids[sampling.index()].as_ref() {
            grid.candidates(eta, phi, &mut out);
        }
        out
    }

    /// Candidate cells across all samplings.
    pub fn candidate_cells_all(&self, eta: f32, phi: f32) -> Vec<CellIndex> {
        let mut out = Vec::with_capacity(BUCKET_CAPACITY);
        for grid in self.grids.iter().flatten() {
            grid.candidates(eta, phi, &mut out);
        }
        out
    }

    /// Closest registered cell of a nearest-cell sampling.
    ///
    /// Distance ties resolve to the larger cell index. Returns `None` on
    /// footprint grids and outside the registered bounds.
    pub fn nearest_cell(&self, sampling: Sampling, eta: f32, phi: f32) -> Option<CellIndex> {
        self.grids[sampling.index()].as_ref()?.nearest(eta, phi)
    }

    /// True if the sampling resolves any cell at the coordinates.
    pub fn has_cell(&self, sampling: Sampling, eta: f32, phi: f32) -> bool {
        self.grids[sampling.index()]
            .as_ref()
            .is_some_and(|grid| grid.has_cell(eta, phi))
    }

    /// Build-time diagnostics.
    pub fn statistics(&self) -> &SpatialBuildStatistics {
        &self.stats
    }
}

/// Accumulates registrations and finishes the lookup.
#[derive(Debug)]
pub struct SpatialLookupBuilder {
    grids: Vec<Option<SamplingGrid>>,
    stats: SpatialBuildStatistics,
}

impl Default for SpatialLookupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialLookupBuilder {
    /// Creates a builder with no grids declared.
    pub fn new() -> Self {
        Self {
            grids: (0..=topocal_core::NUM_SAMPLINGS).map(|_| None).collect(),
            stats: SpatialBuildStatistics::default(),
        }
    }

    /// Declares the grid of one sampling.
    pub fn add_grid(&mut self, sampling: Sampling, spec: GridSpec) {
        self.grids[sampling.index()] = Some(SamplingGrid::new(spec));
    }

    /// Registers one cell into its sampling's grid, if declared.
    pub fn register_cell(
        &mut self,
        sampling: Sampling,
        cell: CellIndex,
        eta: f32,
        phi: f32,
        deta: f32,
        dphi: f32,
    ) {
        if let Some(grid) = self.grids[sampling.index()].as_mut() {
            grid.register_cell(cell, eta, phi, deta, dphi, &mut self.stats);
        }
    }

    /// Runs the nearest-cell paving and freezes the lookup.
    pub fn finish(mut self) -> SpatialLookup {
        for grid in self.grids.iter_mut().flatten() {
            grid.finish(&mut self.stats);
        }
        SpatialLookup {
            grids: self.grids,
            stats: self.stats,
        }
    }
}
