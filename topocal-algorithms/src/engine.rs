//! Seeded topological cluster growth.
//!
//! One pass runs significance evaluation (parallel), seed selection
//! (parallel collection, deterministically ordered), priority-frontier
//! growth with merging and cell sharing (sequential; this ordering is the
//! determinism anchor), and finalization. Identical inputs produce
//! bit-identical cluster assignments.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;
use topocal_core::{
    CellRecord, Cluster, ClusterId, ClusterTagStore, ClusteringConfig, Error, NoiseTable, Result,
    MAX_CLUSTERS,
};
use topocal_geometry::{DetectorGeometry, NeighborMask};

use crate::significance::{self, CellLevel};
use crate::timecut;
use crate::union_find::UnionFind;

/// Counters of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStatistics {
    /// Cells presented to the pass.
    pub cells: usize,
    /// Cells with usable records.
    pub usable_cells: usize,
    /// Seeds selected.
    pub seeds: usize,
    /// Seed candidates excluded entirely by the time cut.
    pub out_of_time_excluded: usize,
    /// Cells claimed as growth members.
    pub grown: usize,
    /// Cells claimed as terminal members.
    pub terminal: usize,
    /// Cells permanently excluded during growth.
    pub excluded: usize,
    /// Cells split between two clusters.
    pub shared: usize,
    /// Cluster merges performed.
    pub merges: usize,
    /// Clusters failing the final acceptance cut.
    pub cut_clusters: usize,
    /// Clusters surviving finalization.
    pub surviving_clusters: usize,
}

/// Per-event mutable state of the engine.
///
/// Exclusive to one event; reset and reused across events, never shared.
#[derive(Debug, Clone)]
pub struct PassState {
    tags: ClusterTagStore,
    excluded: Vec<bool>,
    clusters: Vec<Cluster>,
    seed_significance: Vec<f32>,
    survivors: Vec<ClusterId>,
    stats: PassStatistics,
}

impl PassState {
    fn new(n_cells: usize) -> Self {
        Self {
            tags: ClusterTagStore::new(n_cells),
            excluded: vec![false; n_cells],
            clusters: Vec::new(),
            seed_significance: Vec::new(),
            survivors: Vec::new(),
            stats: PassStatistics::default(),
        }
    }

    /// Returns the state to its post-construction condition.
    pub fn reset(&mut self) {
        self.tags.reset();
        self.excluded.fill(false);
        self.clusters.clear();
        self.seed_significance.clear();
        self.survivors.clear();
        self.stats = PassStatistics::default();
    }

    /// Per-cell cluster assignments.
    pub fn tags(&self) -> &ClusterTagStore {
        &self.tags
    }

    /// The cluster table in id (seed) order, including invalidated
    /// entries.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Surviving cluster ids, ordered by descending transverse energy
    /// (ties by id).
    pub fn survivors(&self) -> &[ClusterId] {
        &self.survivors
    }

    /// Counters of the last pass.
    pub fn statistics(&self) -> &PassStatistics {
        &self.stats
    }
}

/// Frontier entry; higher significance pops first, ties go to the lower
/// cell index.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    significance: f32,
    cell: u32,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significance
            .total_cmp(&other.significance)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedDecision {
    No,
    Seed,
    OutOfTime,
}

/// The topological clustering engine.
#[derive(Debug, Clone)]
pub struct TopoClustering {
    config: ClusteringConfig,
    growth_mask: NeighborMask,
}

impl TopoClustering {
    /// Creates an engine from a validated configuration.
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        config.validate()?;
        let growth_mask = NeighborMask::from_option(config.neighbor_option);
        Ok(Self {
            config,
            growth_mask,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Allocates per-event state for a geometry of `n_cells`.
    pub fn create_state(&self, n_cells: usize) -> PassState {
        PassState::new(n_cells)
    }

    /// Runs one clustering pass; returns the number of surviving
    /// clusters.
    ///
    /// Results are left in `state`: the cluster table, the Et-ordered
    /// survivor index, the per-cell tags and the pass counters.
    pub fn cluster(
        &self,
        geometry: &DetectorGeometry,
        cells: &[CellRecord],
        noise: &NoiseTable,
        state: &mut PassState,
    ) -> Result<usize> {
        let n = geometry.n_cells();
        if cells.len() != n || state.tags.len() != n || noise.len() != n {
            return Err(Error::GeometrySizeMismatch {
                expected: n,
                got: cells.len().min(state.tags.len()).min(noise.len()),
            });
        }
        state.reset();
        state.stats.cells = n;

        let levels = significance::evaluate(geometry, cells, noise, self.config.two_gaussian_noise);
        state.stats.usable_cells = levels.iter().filter(|level| level.usable).count();

        self.select_seeds(geometry, cells, &levels, state)?;
        let mut merges = self.grow(geometry, &levels, state);
        self.finalize(geometry, cells, state, &mut merges);

        Ok(state.survivors.len())
    }

    /// Seed selection: whitelist, significance threshold and time cut,
    /// then stable descending-significance ordering with ties broken by
    /// cell index. Fresh ids are assigned in that order.
    fn select_seeds(
        &self,
        geometry: &DetectorGeometry,
        cells: &[CellRecord],
        levels: &[CellLevel],
        state: &mut PassState,
    ) -> Result<()> {
        let config = &self.config;
        let whitelist = config.seed_sampling_lookup();
        let neighbors = geometry.neighbors();

        let decisions: Vec<SeedDecision> = (0..levels.len())
            .into_par_iter()
            .map(|cell| {
                let level = levels[cell];
                if !level.usable || level.noise_exempt {
                    return SeedDecision::No;
                }
                let sampling = geometry.descriptor(cell).sampling;
                if !whitelist[sampling.index()] {
                    return SeedDecision::No;
                }
                if !significance::passes(
                    level.significance,
                    config.seed_threshold_sigma,
                    config.seed_cuts_in_abs_e,
                ) {
                    return SeedDecision::No;
                }
                if timecut::passes_seed_time_cut(
                    cell,
                    &cells[cell],
                    level.significance.abs(),
                    neighbors,
                    cells,
                    sampling.is_em2(),
                    sampling.is_em3(),
                    config,
                ) {
                    SeedDecision::Seed
                } else if config.cut_oot_seed {
                    SeedDecision::OutOfTime
                } else {
                    SeedDecision::No
                }
            })
            .collect();

        let mut seeds: Vec<(f32, u32)> = Vec::new();
        for (cell, decision) in decisions.iter().enumerate() {
            match decision {
                SeedDecision::Seed => {
                    seeds.push((levels[cell].significance.abs(), cell as u32));
                }
                SeedDecision::OutOfTime => {
                    state.excluded[cell] = true;
                    state.stats.out_of_time_excluded += 1;
                }
                SeedDecision::No => {}
            }
        }

        // Unique cell indices make the unstable sort a strict total
        // order, so the result is reproducible.
        seeds.par_sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        if seeds.len() > MAX_CLUSTERS {
            return Err(Error::ClusterCapacityExceeded {
                limit: MAX_CLUSTERS,
            });
        }

        for &(significance_abs, cell) in &seeds {
            let id = state.clusters.len() as ClusterId;
            state.clusters.push(Cluster::new(cell as usize));
            state.seed_significance.push(significance_abs);
            state.tags.get_mut(cell as usize).assign_primary(id);
        }
        state.stats.seeds = seeds.len();
        Ok(())
    }

    /// Priority-frontier growth with merging and sharing.
    fn grow(
        &self,
        geometry: &DetectorGeometry,
        levels: &[CellLevel],
        state: &mut PassState,
    ) -> UnionFind {
        let config = &self.config;
        let neighbors = geometry.neighbors();
        let mut merges = UnionFind::new(state.clusters.len());

        let mut frontier = BinaryHeap::with_capacity(state.clusters.len() * 4);
        for cluster in &state.clusters {
            let cell = cluster.seed_cell as u32;
            frontier.push(Frontier {
                significance: levels[cell as usize].significance.abs(),
                cell,
            });
        }

        let mut adjacency = Vec::with_capacity(topocal_geometry::MAX_NEIGHBORS_PER_CELL);
        while let Some(active) = frontier.pop() {
            let active_cell = active.cell as usize;
            let owner = merges.find(state.tags.get(active_cell).primary() as usize);

            adjacency.clear();
            neighbors.neighbors(active_cell, self.growth_mask, &mut adjacency);
            for &neighbor in &adjacency {
                let cell = neighbor as usize;
                if state.excluded[cell] {
                    continue;
                }
                let level = levels[cell];
                if !level.usable {
                    state.excluded[cell] = true;
                    continue;
                }

                let passes_growth = !level.noise_exempt
                    && significance::passes(
                        level.significance,
                        config.neighbor_threshold_sigma,
                        config.neighbor_cuts_in_abs_e,
                    );
                let tag = *state.tags.get(cell);

                if !tag.is_claimed() {
                    if passes_growth {
                        state.tags.get_mut(cell).assign_primary(owner as ClusterId);
                        frontier.push(Frontier {
                            significance: level.significance.abs(),
                            cell: neighbor,
                        });
                        state.stats.grown += 1;
                    } else if level.noise_exempt
                        || significance::passes(
                            level.significance,
                            config.cell_threshold_sigma,
                            config.cell_cuts_in_abs_e,
                        )
                    {
                        state.tags.get_mut(cell).assign_primary(owner as ClusterId);
                        state.stats.terminal += 1;
                    } else {
                        state.excluded[cell] = true;
                        state.stats.excluded += 1;
                    }
                    continue;
                }

                let other = merges.find(tag.primary() as usize);
                if other == owner {
                    continue;
                }
                // A seed anchors its own cluster; contact between
                // clusters resolves through the cells around it.
                if state.clusters[tag.primary() as usize].seed_cell == cell as i64 {
                    continue;
                }
                if passes_growth {
                    // The cell qualifies through the neighbor threshold
                    // from both clusters: split it between the two. Any
                    // further cluster reaching it is ignored (three-way
                    // sharing is unsupported).
                    if !tag.is_shared() {
                        let first = state.seed_significance[other];
                        let second = state.seed_significance[owner];
                        let weight = if first + second > 0.0 {
                            first / (first + second)
                        } else {
                            0.5
                        };
                        state
                            .tags
                            .get_mut(cell)
                            .mark_shared(owner as ClusterId, weight);
                        state.stats.shared += 1;
                    }
                } else {
                    // Contact through a cell below the growth threshold
                    // joins the two clusters; the lower id survives.
                    merges.union(owner, other);
                    state.stats.merges += 1;
                }
            }
        }
        merges
    }

    /// Deterministic flatten, weighted sums, centroid, acceptance cut and
    /// the Et-ordered survivor index.
    fn finalize(
        &self,
        geometry: &DetectorGeometry,
        cells: &[CellRecord],
        state: &mut PassState,
        merges: &mut UnionFind,
    ) {
        let config = &self.config;
        let n = geometry.n_cells();
        let n_clusters = state.clusters.len();

        // Invalidate merged-away clusters.
        for id in 0..n_clusters {
            if merges.find(id) != id {
                state.clusters[id].invalidate();
            }
        }

        // Single flatten pass over the tags, in cell order: canonicalize
        // ids, collapse shares whose two owners merged.
        for cell in 0..n {
            let tag = *state.tags.get(cell);
            if !tag.is_claimed() {
                continue;
            }
            let primary = merges.find(tag.primary() as usize) as ClusterId;
            let entry = state.tags.get_mut(cell);
            if tag.is_shared() {
                let secondary = merges.find(tag.secondary() as usize) as ClusterId;
                let weight = tag.shared_weight();
                entry.assign_primary(primary);
                if secondary != primary {
                    entry.mark_shared(secondary, weight);
                }
            } else {
                entry.assign_primary(primary);
            }
        }

        // Weighted energy sums and |E|-weighted centroids, accumulated in
        // cell order.
        let mut energy = vec![0.0f64; n_clusters];
        let mut weight_sum = vec![0.0f64; n_clusters];
        let mut eta_sum = vec![0.0f64; n_clusters];
        let mut phi_sum = vec![0.0f64; n_clusters];

        let mut contribute = |id: usize, contribution: f64, cell: usize| {
            energy[id] += contribution;
            let weight = contribution.abs();
            let descriptor = geometry.descriptor(cell);
            let seed_phi = f64::from(
                geometry
                    .descriptor(state.clusters[id].seed_cell as usize)
                    .phi,
            );
            weight_sum[id] += weight;
            eta_sum[id] += weight * f64::from(descriptor.eta);
            // Keep phi contributions on the seed's branch of the circle.
            phi_sum[id] +=
                weight * (seed_phi + angular_difference(f64::from(descriptor.phi), seed_phi));
        };

        for cell in 0..n {
            let tag = *state.tags.get(cell);
            if !tag.is_claimed() {
                continue;
            }
            let cell_energy = f64::from(cells[cell].energy);
            let weight = f64::from(tag.shared_weight());
            contribute(tag.primary() as usize, cell_energy * weight, cell);
            if tag.is_shared() {
                contribute(tag.secondary() as usize, cell_energy * (1.0 - weight), cell);
            }
        }

        for id in 0..n_clusters {
            if !state.clusters[id].is_valid() {
                continue;
            }
            let seed = state.clusters[id].seed_cell as usize;
            let cluster = &mut state.clusters[id];
            cluster.energy = energy[id];
            if weight_sum[id] > 0.0 {
                cluster.eta = eta_sum[id] / weight_sum[id];
                cluster.phi = wrap_phi(phi_sum[id] / weight_sum[id]);
            } else {
                cluster.eta = f64::from(geometry.descriptor(seed).eta);
                cluster.phi = f64::from(geometry.descriptor(seed).phi);
            }
            cluster.et = cluster.energy / cluster.eta.cosh();

            let acceptance = if config.cut_clusters_in_abs_et {
                cluster.et.abs()
            } else {
                cluster.et
            };
            if acceptance < f64::from(config.cluster_et_cut_mev) {
                cluster.invalidate();
                state.stats.cut_clusters += 1;
            }
        }

        let mut survivors: Vec<ClusterId> = (0..n_clusters as u32)
            .filter(|&id| state.clusters[id as usize].is_valid())
            .map(|id| id as ClusterId)
            .collect();
        let acceptance_value = |id: ClusterId| {
            let et = state.clusters[id as usize].et;
            if config.cut_clusters_in_abs_et {
                et.abs()
            } else {
                et
            }
        };
        survivors
            .sort_by(|&a, &b| acceptance_value(b).total_cmp(&acceptance_value(a)).then_with(|| a.cmp(&b)));
        state.stats.surviving_clusters = survivors.len();
        state.survivors = survivors;
    }
}

/// Smallest angular difference `a - b`, wrapped into `[-pi, pi)`.
fn angular_difference(a: f64, b: f64) -> f64 {
    let mut diff = a - b;
    while diff >= std::f64::consts::PI {
        diff -= 2.0 * std::f64::consts::PI;
    }
    while diff < -std::f64::consts::PI {
        diff += 2.0 * std::f64::consts::PI;
    }
    diff
}

/// Wraps an angle into `(-pi, pi]`.
fn wrap_phi(phi: f64) -> f64 {
    let mut wrapped = phi;
    while wrapped > std::f64::consts::PI {
        wrapped -= 2.0 * std::f64::consts::PI;
    }
    while wrapped <= -std::f64::consts::PI {
        wrapped += 2.0 * std::f64::consts::PI;
    }
    wrapped
}
