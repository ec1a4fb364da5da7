//! Per-event cell records: energy, time, gain and quality/provenance.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a cell inside the detector description, in `[0, n_cells)`.
pub type CellIndex = u32;

/// Readout gain state of a cell.
///
/// `MediumHigh` covers the mixed-gain case of double-readout cells where
/// the two channels were digitized at different gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum GainState {
    /// High gain.
    High = 0,
    /// Medium gain.
    Medium = 1,
    /// Low gain.
    Low = 2,
    /// Mixed medium/high gain.
    MediumHigh = 3,
}

/// Number of recognized gain states.
pub const NUM_GAINS: usize = 4;

impl GainState {
    /// Stable index in `[0, 4)`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decodes a raw readout gain byte.
    ///
    /// An unrecognized value is a data error; the caller treats the cell
    /// as invalid for the pass instead of aborting.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(GainState::High),
            1 => Ok(GainState::Medium),
            2 => Ok(GainState::Low),
            3 => Ok(GainState::MediumHigh),
            other => Err(Error::UnrecognizedGain(other)),
        }
    }
}

/// Packed quality and provenance bits of one cell readout.
///
/// Low 16 bits: quality word. High 16 bits: provenance word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityProvenance(pub u32);

impl QualityProvenance {
    /// Provenance bit marking a cell masked as bad by the conditions data.
    pub const MASKED_BAD: u32 = 0x0800 << 16;

    /// Creates a packed word from separate quality and provenance halves.
    #[inline]
    pub fn new(quality: u16, provenance: u16) -> Self {
        Self(u32::from(quality) | (u32::from(provenance) << 16))
    }

    /// Quality half of the word.
    #[inline]
    pub fn quality(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Provenance half of the word.
    #[inline]
    pub fn provenance(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// True if the provenance marks the cell as bad.
    #[inline]
    pub fn is_bad(self) -> bool {
        self.0 & Self::MASKED_BAD != 0
    }
}

/// Per-event input row for one cell; read-only during clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellRecord {
    /// Deposited energy in MeV (signed).
    pub energy: f32,
    /// Reconstructed time in ns.
    pub time: f32,
    /// Readout gain state.
    pub gain: GainState,
    /// Packed quality/provenance word.
    pub quality: QualityProvenance,
}

impl CellRecord {
    /// Creates a record with good quality and the given energy and time.
    #[inline]
    pub fn new(energy: f32, time: f32, gain: GainState) -> Self {
        Self {
            energy,
            time,
            gain,
            quality: QualityProvenance::default(),
        }
    }

    /// True if the provenance marks this cell as bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.quality.is_bad()
    }
}
