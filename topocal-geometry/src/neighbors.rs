//! The twelve-category cell neighbor index.
//!
//! Adjacency is stored as one contiguous run per cell with the categories
//! in fixed order inside the run; a per-cell table of cumulative category
//! end-offsets gives O(1) range lookup for any category combination.

use crate::descriptor::CellDescriptor;
use topocal_core::config::NeighborOption;
use topocal_core::{CellIndex, Error, Result, Subdetector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed per-cell adjacency capacity across all categories.
pub const MAX_NEIGHBORS_PER_CELL: usize = 34;

/// Number of neighbor-relation categories.
pub const NUM_CATEGORIES: usize = 12;

/// Absolute eta above which a HEC cell counts as inner-wheel.
const HEC_INNER_WHEEL_ETA: f32 = 2.5;

/// One of the twelve neighbor-relation categories, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
#[repr(u8)]
pub enum NeighborCategory {
    PrevInPhi = 0,
    NextInPhi = 1,
    PrevInEta = 2,
    NextInEta = 3,
    Corners2D = 4,
    PrevInSamp = 5,
    NextInSamp = 6,
    PrevSubDet = 7,
    NextSubDet = 8,
    Corners3D = 9,
    PrevSuperCalo = 10,
    NextSuperCalo = 11,
}

impl NeighborCategory {
    /// All categories in their fixed order.
    pub const ALL: [NeighborCategory; NUM_CATEGORIES] = [
        NeighborCategory::PrevInPhi,
        NeighborCategory::NextInPhi,
        NeighborCategory::PrevInEta,
        NeighborCategory::NextInEta,
        NeighborCategory::Corners2D,
        NeighborCategory::PrevInSamp,
        NeighborCategory::NextInSamp,
        NeighborCategory::PrevSubDet,
        NeighborCategory::NextSubDet,
        NeighborCategory::Corners3D,
        NeighborCategory::PrevSuperCalo,
        NeighborCategory::NextSuperCalo,
    ];

    /// Position of this category inside a cell's run.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Bit set over the twelve neighbor categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeighborMask(u16);

impl NeighborMask {
    /// No categories.
    pub const NONE: NeighborMask = NeighborMask(0);
    /// All twelve categories.
    pub const ALL: NeighborMask = NeighborMask(0x0fff);
    /// Phi, eta and corner neighbors within the same layer.
    pub const SAME_LAYER_2D: NeighborMask = NeighborMask(0b0000_0001_1111);
    /// The 2-D set plus the in-sampling relations and 3-D corners.
    pub const SAME_CALO_3D: NeighborMask = NeighborMask(0b0010_0111_1111);
    /// Everything, including the cross-calorimeter relations.
    pub const ALL_CALO_3D: NeighborMask = NeighborMask::ALL;
    /// The next-in-sampling category alone (restricted-cell view).
    pub const NEXT_IN_SAMP: NeighborMask =
        NeighborMask(1 << NeighborCategory::NextInSamp as u16);

    /// Mask with a single category set.
    #[inline]
    pub fn single(category: NeighborCategory) -> Self {
        NeighborMask(1 << category.index())
    }

    /// Parses raw bits; bits outside the twelve categories are malformed.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !0x0fff != 0 {
            return Err(Error::MalformedNeighborMask(bits));
        }
        Ok(NeighborMask(bits as u16))
    }

    /// Mask matching a configured neighbor-relation set.
    pub fn from_option(option: NeighborOption) -> Self {
        match option {
            NeighborOption::SameLayer2D => Self::SAME_LAYER_2D,
            NeighborOption::SameCalo3D => Self::SAME_CALO_3D,
            NeighborOption::AllCalo3D => Self::ALL_CALO_3D,
        }
    }

    /// True if `category` is in the set.
    #[inline]
    pub fn contains(self, category: NeighborCategory) -> bool {
        self.0 & (1 << category.index()) != 0
    }

    /// Union of two masks.
    #[inline]
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        NeighborMask(self.0 | other.0)
    }

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }
}

const LIMIT_HEC_IW_FCAL: u8 = 0b01;
const LIMIT_PRESAMPLER: u8 = 0b10;

/// Capacity-bounded per-cell adjacency lists, partitioned into the twelve
/// categories.
///
/// Cells flagged under an active restriction policy answer every query,
/// regardless of the requested mask, with exactly their next-in-sampling
/// sub-range; this bounds runaway growth through geometrically oversized
/// cells without branching the growth algorithm.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellNeighborIndex {
    /// Start of each cell's run in `list`; length `n_cells + 1`.
    base: Vec<u32>,
    /// Cumulative end offsets of each category inside the cell's run.
    /// Monotonically non-decreasing; an empty category has start == end.
    cat_end: Vec<[u8; NUM_CATEGORIES]>,
    /// Flattened neighbor lists.
    list: Vec<CellIndex>,
    /// Per-cell restriction bits.
    limited: Vec<u8>,
    /// Restriction policies enabled when the index was built.
    active_limits: u8,
}

impl CellNeighborIndex {
    /// Number of cells covered.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cat_end.len()
    }

    /// Total neighbors of a cell across all categories.
    #[inline]
    pub fn total_neighbors(&self, cell: usize) -> usize {
        self.cat_end[cell][NUM_CATEGORIES - 1] as usize
    }

    /// True if an active restriction policy limits this cell.
    #[inline]
    pub fn is_limited(&self, cell: usize) -> bool {
        self.limited[cell] & self.active_limits != 0
    }

    /// Category sub-range inside a cell's run.
    #[inline]
    fn category_range(&self, cell: usize, category: NeighborCategory) -> (usize, usize) {
        let ends = &self.cat_end[cell];
        let index = category.index();
        let start = if index == 0 { 0 } else { ends[index - 1] as usize };
        (start, ends[index] as usize)
    }

    /// Number of neighbors a query with `mask` would return.
    pub fn neighbor_count(&self, cell: usize, mask: NeighborMask) -> usize {
        let effective = self.effective_mask(cell, mask);
        let mut count = 0;
        for category in NeighborCategory::ALL {
            if effective.contains(category) {
                let (start, end) = self.category_range(cell, category);
                count += end - start;
            }
        }
        count
    }

    /// Appends the neighbors selected by `mask` to `out`.
    ///
    /// For a limited cell the mask is ignored and exactly the
    /// next-in-sampling sub-range is returned.
    pub fn neighbors(&self, cell: usize, mask: NeighborMask, out: &mut Vec<CellIndex>) {
        let effective = self.effective_mask(cell, mask);
        let run = self.base[cell] as usize;
        for category in NeighborCategory::ALL {
            if effective.contains(category) {
                let (start, end) = self.category_range(cell, category);
                out.extend_from_slice(&self.list[run + start..run + end]);
            }
        }
    }

    /// Convenience variant of [`neighbors`](Self::neighbors) returning a
    /// fresh vector.
    pub fn neighbors_collect(&self, cell: usize, mask: NeighborMask) -> Vec<CellIndex> {
        let mut out = Vec::with_capacity(MAX_NEIGHBORS_PER_CELL);
        self.neighbors(cell, mask, &mut out);
        out
    }

    #[inline]
    fn effective_mask(&self, cell: usize, mask: NeighborMask) -> NeighborMask {
        if self.is_limited(cell) {
            NeighborMask::NEXT_IN_SAMP
        } else {
            mask
        }
    }
}

/// Accumulates per-category neighbor lists and builds the flattened index.
#[derive(Debug)]
pub struct NeighborIndexBuilder {
    per_cell: Vec<[Vec<CellIndex>; NUM_CATEGORIES]>,
}

impl NeighborIndexBuilder {
    /// Creates a builder for `n_cells` cells.
    pub fn new(n_cells: usize) -> Self {
        Self {
            per_cell: (0..n_cells).map(|_| Default::default()).collect(),
        }
    }

    /// Records one directed relation.
    pub fn add_neighbor(
        &mut self,
        cell: usize,
        category: NeighborCategory,
        neighbor: CellIndex,
    ) -> Result<()> {
        let n_cells = self.per_cell.len();
        if cell >= n_cells || neighbor as usize >= n_cells {
            return Err(Error::GeometrySizeMismatch {
                expected: n_cells,
                got: cell.max(neighbor as usize) + 1,
            });
        }
        self.per_cell[cell][category.index()].push(neighbor);
        Ok(())
    }

    /// Flattens the accumulated lists, computes restriction bits from the
    /// descriptors, and freezes the index.
    pub fn build(
        self,
        descriptors: &[CellDescriptor],
        restrict_hec_iw_and_fcal: bool,
        restrict_presampler: bool,
    ) -> Result<CellNeighborIndex> {
        let n_cells = self.per_cell.len();
        if descriptors.len() != n_cells {
            return Err(Error::GeometrySizeMismatch {
                expected: n_cells,
                got: descriptors.len(),
            });
        }

        let mut base = Vec::with_capacity(n_cells + 1);
        let mut cat_end = Vec::with_capacity(n_cells);
        let mut list = Vec::new();
        let mut limited = vec![0u8; n_cells];

        base.push(0);
        for (cell, categories) in self.per_cell.iter().enumerate() {
            let total: usize = categories.iter().map(Vec::len).sum();
            if total > MAX_NEIGHBORS_PER_CELL {
                return Err(Error::NeighborCapacityExceeded {
                    cell,
                    count: total,
                    capacity: MAX_NEIGHBORS_PER_CELL,
                });
            }

            let mut ends = [0u8; NUM_CATEGORIES];
            let mut cursor = 0u8;
            for (index, neighbors) in categories.iter().enumerate() {
                list.extend_from_slice(neighbors);
                cursor += neighbors.len() as u8;
                ends[index] = cursor;
            }
            cat_end.push(ends);
            base.push(list.len() as u32);

            let descriptor = &descriptors[cell];
            let subdetector = descriptor.sampling.subdetector();
            let is_hec_iw = subdetector == Subdetector::LArHEC
                && descriptor.eta.abs() >= HEC_INNER_WHEEL_ETA;
            if is_hec_iw || subdetector == Subdetector::LArFCal {
                limited[cell] |= LIMIT_HEC_IW_FCAL;
            }
            if descriptor.sampling.is_presampler() {
                limited[cell] |= LIMIT_PRESAMPLER;
            }
        }

        let mut active_limits = 0u8;
        if restrict_hec_iw_and_fcal {
            active_limits |= LIMIT_HEC_IW_FCAL;
        }
        if restrict_presampler {
            active_limits |= LIMIT_PRESAMPLER;
        }

        Ok(CellNeighborIndex {
            base,
            cat_end,
            list,
            limited,
            active_limits,
        })
    }
}
