//! topocal-geometry: Immutable calorimeter geometry services.
//!
//! Everything here is built once at startup from the detector
//! description, then shared read-only across all events and threads:
//! per-cell descriptors, the twelve-category neighbor index, and the
//! (eta, phi) to cell spatial lookup.
//!
#![warn(missing_docs)]

pub mod descriptor;
pub mod neighbors;
pub mod spatial;

pub use descriptor::{CellDescriptor, DetectorGeometry, GeometryBuilder};
pub use neighbors::{
    CellNeighborIndex, NeighborCategory, NeighborIndexBuilder, NeighborMask, MAX_NEIGHBORS_PER_CELL,
};
pub use spatial::{GridSpec, SamplingGrid, SpatialBuildStatistics, SpatialLookup, BUCKET_CAPACITY};
