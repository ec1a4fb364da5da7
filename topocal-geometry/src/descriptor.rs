//! Per-cell descriptors and the assembled detector geometry.

use crate::neighbors::{CellNeighborIndex, NeighborCategory, NeighborIndexBuilder};
use crate::spatial::{GridSpec, SpatialLookup, SpatialLookupBuilder};
use topocal_core::{CellIndex, Result, Sampling};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Immutable per-process attributes of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellDescriptor {
    /// Sampling layer the cell belongs to.
    pub sampling: Sampling,
    /// Pseudorapidity of the cell center.
    pub eta: f32,
    /// Azimuth of the cell center, in `(-pi, pi]`.
    pub phi: f32,
    /// Cartesian position of the cell center, in mm.
    pub x: f32,
    /// Cartesian position of the cell center, in mm.
    pub y: f32,
    /// Cartesian position of the cell center, in mm.
    pub z: f32,
    /// Cell volume in mm^3.
    pub volume: f32,
    /// Full eta extent of the cell.
    pub deta: f32,
    /// Full phi extent of the cell.
    pub dphi: f32,
}

impl CellDescriptor {
    /// Creates a descriptor from angular position and extent.
    pub fn new(sampling: Sampling, eta: f32, phi: f32, deta: f32, dphi: f32) -> Self {
        Self {
            sampling,
            eta,
            phi,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            volume: 0.0,
            deta,
            dphi,
        }
    }

    /// Sets the Cartesian position.
    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    /// Sets the cell volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}

/// The assembled, immutable geometry: descriptors, neighbor index and
/// spatial lookup.
///
/// Built once at startup, then shared read-only (typically behind an
/// `Arc`) across all per-event clustering passes for the process
/// lifetime.
#[derive(Debug)]
pub struct DetectorGeometry {
    descriptors: Vec<CellDescriptor>,
    neighbors: CellNeighborIndex,
    spatial: SpatialLookup,
}

impl DetectorGeometry {
    /// Starts building a geometry.
    pub fn builder() -> GeometryBuilder {
        GeometryBuilder::new()
    }

    /// Number of cells.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.descriptors.len()
    }

    /// Descriptor of one cell.
    #[inline]
    pub fn descriptor(&self, cell: usize) -> &CellDescriptor {
        &self.descriptors[cell]
    }

    /// All descriptors in cell order.
    #[inline]
    pub fn descriptors(&self) -> &[CellDescriptor] {
        &self.descriptors
    }

    /// The neighbor index.
    #[inline]
    pub fn neighbors(&self) -> &CellNeighborIndex {
        &self.neighbors
    }

    /// The (eta, phi) to cell lookup.
    #[inline]
    pub fn spatial(&self) -> &SpatialLookup {
        &self.spatial
    }
}

/// Accumulates cells, neighbor relations and grid specifications, then
/// builds a [`DetectorGeometry`].
#[derive(Debug, Default)]
pub struct GeometryBuilder {
    descriptors: Vec<CellDescriptor>,
    relations: Vec<(usize, NeighborCategory, CellIndex)>,
    grids: Vec<(Sampling, GridSpec)>,
    restrict_hec_iw_and_fcal: bool,
    restrict_presampler: bool,
}

impl GeometryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cell; returns its index.
    pub fn add_cell(&mut self, descriptor: CellDescriptor) -> CellIndex {
        let index = self.descriptors.len() as CellIndex;
        self.descriptors.push(descriptor);
        index
    }

    /// Records one directed neighbor relation.
    pub fn add_neighbor(&mut self, cell: CellIndex, category: NeighborCategory, neighbor: CellIndex) {
        self.relations.push((cell as usize, category, neighbor));
    }

    /// Declares the spatial grid of one sampling.
    ///
    /// Samplings without a grid simply answer no spatial queries.
    pub fn add_grid(&mut self, sampling: Sampling, spec: GridSpec) {
        self.grids.push((sampling, spec));
    }

    /// Enables the HEC-inner-wheel / FCal neighbor restriction policy.
    #[must_use]
    pub fn restrict_hec_iw_and_fcal_neighbors(mut self, enabled: bool) -> Self {
        self.restrict_hec_iw_and_fcal = enabled;
        self
    }

    /// Enables the presampler neighbor restriction policy.
    #[must_use]
    pub fn restrict_presampler_neighbors(mut self, enabled: bool) -> Self {
        self.restrict_presampler = enabled;
        self
    }

    /// Builds the immutable geometry.
    ///
    /// Fails with a configuration error if any cell exceeds the adjacency
    /// capacity.
    pub fn build(self) -> Result<DetectorGeometry> {
        let n_cells = self.descriptors.len();

        let mut neighbor_builder = NeighborIndexBuilder::new(n_cells);
        for (cell, category, neighbor) in self.relations {
            neighbor_builder.add_neighbor(cell, category, neighbor)?;
        }
        let neighbors = neighbor_builder.build(
            &self.descriptors,
            self.restrict_hec_iw_and_fcal,
            self.restrict_presampler,
        )?;

        let mut spatial_builder = SpatialLookupBuilder::new();
        for (sampling, spec) in self.grids {
            spatial_builder.add_grid(sampling, spec);
        }
        for (cell, descriptor) in self.descriptors.iter().enumerate() {
            spatial_builder.register_cell(
                descriptor.sampling,
                cell as CellIndex,
                descriptor.eta,
                descriptor.phi,
                descriptor.deta,
                descriptor.dphi,
            );
        }
        let spatial = spatial_builder.finish();

        Ok(DetectorGeometry {
            descriptors: self.descriptors,
            neighbors,
            spatial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assembles_geometry() {
        let mut builder = DetectorGeometry::builder();
        let a = builder.add_cell(CellDescriptor::new(Sampling::EMB2, 0.0, 0.0, 0.025, 0.025));
        let b = builder.add_cell(CellDescriptor::new(Sampling::EMB2, 0.025, 0.0, 0.025, 0.025));
        builder.add_neighbor(a, NeighborCategory::NextInEta, b);
        builder.add_neighbor(b, NeighborCategory::PrevInEta, a);

        let geometry = builder.build().unwrap();
        assert_eq!(geometry.n_cells(), 2);
        assert_eq!(geometry.descriptor(1).eta, 0.025);
        assert_eq!(geometry.neighbors().total_neighbors(0), 1);
    }
}
