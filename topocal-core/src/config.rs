//! Clustering configuration.

use crate::error::{Error, Result};
use crate::sampling::Sampling;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which neighbor-relation categories the growth step traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeighborOption {
    /// Phi/eta/corner neighbors within the same layer only.
    SameLayer2D,
    /// 2-D set plus the in-sampling relations of the same calorimeter.
    SameCalo3D,
    /// Everything, including the cross-calorimeter relations.
    AllCalo3D,
}

/// Configuration for a topological clustering pass.
///
/// Defaults are the production values: 4/2/0 sigma thresholds on `|E|`,
/// an `|Et|` acceptance cut of 0, the full EM+HEC+Tile+FCal seed
/// whitelist, the all-calorimeter neighbor set, and the presampler
/// neighbor restriction enabled.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringConfig {
    /// Seed significance threshold in sigma.
    pub seed_threshold_sigma: f32,
    /// Growth (neighbor) significance threshold in sigma.
    pub neighbor_threshold_sigma: f32,
    /// Cell (terminal-member) significance threshold in sigma.
    pub cell_threshold_sigma: f32,
    /// Cut on `|E|` rather than `E` at the seed stage.
    pub seed_cuts_in_abs_e: bool,
    /// Cut on `|E|` rather than `E` at the growth stage.
    pub neighbor_cuts_in_abs_e: bool,
    /// Cut on `|E|` rather than `E` at the cell stage.
    pub cell_cuts_in_abs_e: bool,
    /// Final cluster transverse-energy acceptance cut in MeV.
    pub cluster_et_cut_mev: f32,
    /// Apply the acceptance cut on `|Et|` rather than `Et`.
    pub cut_clusters_in_abs_et: bool,
    /// Samplings whose cells may seed a cluster.
    pub seed_samplings: Vec<Sampling>,
    /// Neighbor-relation categories traversed during growth.
    pub neighbor_option: NeighborOption,
    /// Limit HEC-inner-wheel and FCal cells to their next-sampling range.
    pub restrict_hec_iw_and_fcal_neighbors: bool,
    /// Limit presampler cells to their next-sampling range.
    pub restrict_ps_neighbors: bool,
    /// Use the two-Gaussian noise model for the Tile subdetector.
    pub two_gaussian_noise: bool,
    /// Apply the seed time cut.
    pub seed_cuts_in_t: bool,
    /// Exclude an out-of-time seed candidate from the cluster entirely,
    /// not merely from seeding.
    pub cut_oot_seed: bool,
    /// Time window for the seed time cut in ns.
    pub seed_time_threshold_ns: f32,
    /// Waive the time cut above a significance upper limit.
    pub use_time_cut_upper_limit: bool,
    /// Significance above which the time cut is waived.
    pub time_cut_upper_limit_sigma: f32,
    /// Widen the time window for EM2 cells with an energetic direct
    /// phi-neighbor.
    pub xtalk_em2: bool,
    /// Also consider second phi-neighbors in EM2.
    pub xtalk_em2_second: bool,
    /// Widen the time window for EM3 cells with an energetic
    /// previous-sampling neighbor.
    pub xtalk_em3: bool,
    /// Time-window extension applied by the cross-talk rules, in ns.
    pub xtalk_delta_t_ns: f32,
    /// Energy above which a neighbor counts as energetic, in MeV.
    pub xtalk_energy_threshold_mev: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed_threshold_sigma: 4.0,
            neighbor_threshold_sigma: 2.0,
            cell_threshold_sigma: 0.0,
            seed_cuts_in_abs_e: true,
            neighbor_cuts_in_abs_e: true,
            cell_cuts_in_abs_e: true,
            cluster_et_cut_mev: 0.0,
            cut_clusters_in_abs_et: true,
            seed_samplings: default_seed_samplings(),
            neighbor_option: NeighborOption::AllCalo3D,
            restrict_hec_iw_and_fcal_neighbors: false,
            restrict_ps_neighbors: true,
            two_gaussian_noise: false,
            seed_cuts_in_t: false,
            cut_oot_seed: false,
            seed_time_threshold_ns: 12.5,
            use_time_cut_upper_limit: false,
            time_cut_upper_limit_sigma: 20.0,
            xtalk_em2: false,
            xtalk_em2_second: false,
            xtalk_em3: false,
            xtalk_delta_t_ns: 15.0,
            xtalk_energy_threshold_mev: 1000.0,
        }
    }
}

fn default_seed_samplings() -> Vec<Sampling> {
    Sampling::all()
        .iter()
        .copied()
        .filter(|sampling| sampling.subdetector() != crate::sampling::Subdetector::MiniFCal)
        .collect()
}

impl ClusteringConfig {
    /// Creates a configuration with the production default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the three significance thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, seed: f32, neighbor: f32, cell: f32) -> Self {
        self.seed_threshold_sigma = seed;
        self.neighbor_threshold_sigma = neighbor;
        self.cell_threshold_sigma = cell;
        self
    }

    /// Sets the final transverse-energy acceptance cut.
    #[must_use]
    pub fn with_et_cut(mut self, et_cut_mev: f32, in_abs_et: bool) -> Self {
        self.cluster_et_cut_mev = et_cut_mev;
        self.cut_clusters_in_abs_et = in_abs_et;
        self
    }

    /// Sets the seed sampling whitelist.
    #[must_use]
    pub fn with_seed_samplings(mut self, samplings: Vec<Sampling>) -> Self {
        self.seed_samplings = samplings;
        self
    }

    /// Resolves a seed sampling whitelist from conventional names.
    ///
    /// Any unresolved name is a fatal configuration error.
    pub fn with_seed_sampling_names(mut self, names: &[&str]) -> Result<Self> {
        self.seed_samplings = names
            .iter()
            .map(|name| Sampling::from_name(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// Sets the neighbor-relation set used for growth.
    #[must_use]
    pub fn with_neighbor_option(mut self, option: NeighborOption) -> Self {
        self.neighbor_option = option;
        self
    }

    /// Enables the seed time cut.
    #[must_use]
    pub fn with_seed_time_cut(mut self, threshold_ns: f32, cut_oot_seed: bool) -> Self {
        self.seed_cuts_in_t = true;
        self.seed_time_threshold_ns = threshold_ns;
        self.cut_oot_seed = cut_oot_seed;
        self
    }

    /// Enables the two-Gaussian noise model.
    #[must_use]
    pub fn with_two_gaussian_noise(mut self, enabled: bool) -> Self {
        self.two_gaussian_noise = enabled;
        self
    }

    /// Per-sampling seed eligibility lookup, indexed by `Sampling::index`.
    pub fn seed_sampling_lookup(&self) -> [bool; 29] {
        let mut lookup = [false; 29];
        for sampling in &self.seed_samplings {
            lookup[sampling.index()] = true;
        }
        lookup
    }

    /// Checks threshold ordering and cut parameters.
    pub fn validate(&self) -> Result<()> {
        if self.neighbor_threshold_sigma > self.seed_threshold_sigma {
            return Err(Error::InvalidThresholds(format!(
                "neighbor threshold {} above seed threshold {}",
                self.neighbor_threshold_sigma, self.seed_threshold_sigma
            )));
        }
        if self.cell_threshold_sigma > self.neighbor_threshold_sigma {
            return Err(Error::InvalidThresholds(format!(
                "cell threshold {} above neighbor threshold {}",
                self.cell_threshold_sigma, self.neighbor_threshold_sigma
            )));
        }
        if self.seed_cuts_in_t && self.seed_time_threshold_ns < 0.0 {
            return Err(Error::InvalidThresholds(format!(
                "negative seed time threshold {}",
                self.seed_time_threshold_ns
            )));
        }
        if self.xtalk_delta_t_ns < 0.0 {
            return Err(Error::InvalidThresholds(format!(
                "negative cross-talk window extension {}",
                self.xtalk_delta_t_ns
            )));
        }
        Ok(())
    }
}
