//! topocal-algorithms: Topological cluster growth.
//!
//! The engine partitions calorimeter cells into clusters by seeded graph
//! growth over the precomputed neighbor index:
//! - **Significance** - parallel per-cell `E / sigma` evaluation
//! - **Seeding** - thresholded, whitelisted, deterministically ordered
//! - **Growth** - priority-frontier expansion with merging and sharing
//! - **Finalize** - weighted sums, centroids, acceptance cut
//!
#![warn(missing_docs)]

mod engine;
pub mod significance;
pub mod timecut;
mod union_find;

pub use engine::{PassState, PassStatistics, TopoClustering};
pub use significance::CellLevel;
pub use union_find::UnionFind;

// Re-export the core configuration types alongside the engine.
pub use topocal_core::{ClusteringConfig, NeighborOption};
