//! Sampling layers and subdetector regions.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of real sampling layers (the `Unknown` sentinel is extra).
pub const NUM_SAMPLINGS: usize = 28;

/// One of the 28 longitudinal calorimeter layers.
///
/// The discriminants fix the conventional sampling numbering; the
/// `Unknown` sentinel marks cells outside the described geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Sampling {
    PreSamplerB = 0,
    EMB1 = 1,
    EMB2 = 2,
    EMB3 = 3,
    PreSamplerE = 4,
    EME1 = 5,
    EME2 = 6,
    EME3 = 7,
    HEC0 = 8,
    HEC1 = 9,
    HEC2 = 10,
    HEC3 = 11,
    TileBar0 = 12,
    TileBar1 = 13,
    TileBar2 = 14,
    TileGap1 = 15,
    TileGap2 = 16,
    TileGap3 = 17,
    TileExt0 = 18,
    TileExt1 = 19,
    TileExt2 = 20,
    FCal0 = 21,
    FCal1 = 22,
    FCal2 = 23,
    MiniFCal0 = 24,
    MiniFCal1 = 25,
    MiniFCal2 = 26,
    MiniFCal3 = 27,
    Unknown = 28,
}

/// Coarse calorimeter region a sampling belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum Subdetector {
    LArEM,
    LArHEC,
    Tile,
    LArFCal,
    MiniFCal,
    Unknown,
}

const ALL_SAMPLINGS: [Sampling; NUM_SAMPLINGS] = [
    Sampling::PreSamplerB,
    Sampling::EMB1,
    Sampling::EMB2,
    Sampling::EMB3,
    Sampling::PreSamplerE,
    Sampling::EME1,
    Sampling::EME2,
    Sampling::EME3,
    Sampling::HEC0,
    Sampling::HEC1,
    Sampling::HEC2,
    Sampling::HEC3,
    Sampling::TileBar0,
    Sampling::TileBar1,
    Sampling::TileBar2,
    Sampling::TileGap1,
    Sampling::TileGap2,
    Sampling::TileGap3,
    Sampling::TileExt0,
    Sampling::TileExt1,
    Sampling::TileExt2,
    Sampling::FCal0,
    Sampling::FCal1,
    Sampling::FCal2,
    Sampling::MiniFCal0,
    Sampling::MiniFCal1,
    Sampling::MiniFCal2,
    Sampling::MiniFCal3,
];

impl Sampling {
    /// Stable index in `[0, 28]`; `Unknown` maps to 28.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Sampling for a stable index; indices outside `[0, 27]` map to `Unknown`.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        ALL_SAMPLINGS.get(index).copied().unwrap_or(Sampling::Unknown)
    }

    /// All real samplings in index order.
    pub fn all() -> &'static [Sampling; NUM_SAMPLINGS] {
        &ALL_SAMPLINGS
    }

    /// Resolves a conventional sampling name.
    ///
    /// Unresolved names are a configuration error; they abort
    /// initialization rather than silently shrinking a whitelist.
    pub fn from_name(name: &str) -> Result<Self> {
        let sampling = match name {
            "PreSamplerB" => Sampling::PreSamplerB,
            "EMB1" => Sampling::EMB1,
            "EMB2" => Sampling::EMB2,
            "EMB3" => Sampling::EMB3,
            "PreSamplerE" => Sampling::PreSamplerE,
            "EME1" => Sampling::EME1,
            "EME2" => Sampling::EME2,
            "EME3" => Sampling::EME3,
            "HEC0" => Sampling::HEC0,
            "HEC1" => Sampling::HEC1,
            "HEC2" => Sampling::HEC2,
            "HEC3" => Sampling::HEC3,
            "TileBar0" => Sampling::TileBar0,
            "TileBar1" => Sampling::TileBar1,
            "TileBar2" => Sampling::TileBar2,
            "TileGap1" => Sampling::TileGap1,
            "TileGap2" => Sampling::TileGap2,
            "TileGap3" => Sampling::TileGap3,
            "TileExt0" => Sampling::TileExt0,
            "TileExt1" => Sampling::TileExt1,
            "TileExt2" => Sampling::TileExt2,
            "FCal0" => Sampling::FCal0,
            "FCal1" => Sampling::FCal1,
            "FCal2" => Sampling::FCal2,
            "MiniFCal0" => Sampling::MiniFCal0,
            "MiniFCal1" => Sampling::MiniFCal1,
            "MiniFCal2" => Sampling::MiniFCal2,
            "MiniFCal3" => Sampling::MiniFCal3,
            _ => return Err(Error::UnknownSampling(name.to_string())),
        };
        Ok(sampling)
    }

    /// Coarse region this sampling belongs to.
    pub fn subdetector(self) -> Subdetector {
        match self.index() {
            0..=7 => Subdetector::LArEM,
            8..=11 => Subdetector::LArHEC,
            12..=20 => Subdetector::Tile,
            21..=23 => Subdetector::LArFCal,
            24..=27 => Subdetector::MiniFCal,
            _ => Subdetector::Unknown,
        }
    }

    /// True for the second EM layers (cross-talk in phi is relevant there).
    #[inline]
    pub fn is_em2(self) -> bool {
        matches!(self, Sampling::EMB2 | Sampling::EME2)
    }

    /// True for the third EM layers.
    #[inline]
    pub fn is_em3(self) -> bool {
        matches!(self, Sampling::EMB3 | Sampling::EME3)
    }

    /// True for the presampler layers.
    #[inline]
    pub fn is_presampler(self) -> bool {
        matches!(self, Sampling::PreSamplerB | Sampling::PreSamplerE)
    }

    /// Samplings exempt from noise cuts by convention.
    ///
    /// Cells here are eligible cluster members regardless of significance
    /// but never seed and never extend the growth frontier.
    #[inline]
    pub fn is_noise_exempt(self) -> bool {
        matches!(self, Sampling::PreSamplerB | Sampling::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for &sampling in Sampling::all() {
            assert_eq!(Sampling::from_index(sampling.index()), sampling);
        }
        assert_eq!(Sampling::from_index(28), Sampling::Unknown);
        assert_eq!(Sampling::from_index(9999), Sampling::Unknown);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Sampling::from_name("EMB2").unwrap(), Sampling::EMB2);
        assert_eq!(Sampling::from_name("FCal0").unwrap(), Sampling::FCal0);
        assert!(matches!(
            Sampling::from_name("EMB9"),
            Err(Error::UnknownSampling(_))
        ));
    }

    #[test]
    fn test_subdetector_regions() {
        assert_eq!(Sampling::EMB1.subdetector(), Subdetector::LArEM);
        assert_eq!(Sampling::HEC2.subdetector(), Subdetector::LArHEC);
        assert_eq!(Sampling::TileGap3.subdetector(), Subdetector::Tile);
        assert_eq!(Sampling::FCal1.subdetector(), Subdetector::LArFCal);
        assert_eq!(Sampling::MiniFCal3.subdetector(), Subdetector::MiniFCal);
        assert_eq!(Sampling::Unknown.subdetector(), Subdetector::Unknown);
    }

    #[test]
    fn test_noise_exemption() {
        assert!(Sampling::PreSamplerB.is_noise_exempt());
        assert!(Sampling::Unknown.is_noise_exempt());
        assert!(!Sampling::PreSamplerE.is_noise_exempt());
        assert!(!Sampling::EMB2.is_noise_exempt());
    }
}
