//! LOD tiers, visibility states and the fixed bounds shared by the LOD core.

use serde::{Deserialize, Serialize};

/// Maximum number of viewers cached per frame.
pub const MAX_VIEWERS: usize = 4;

/// Number of distance sub-ranges each bucketed LOD tier is split into.
pub const BUCKETS_PER_LOD: usize = 250;

/// Distances below this are treated as "at the viewer".
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Discrete level of detail, ordered from finest to coarsest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum LodLevel {
    /// Full fidelity.
    High = 0,
    /// Reduced fidelity.
    Medium = 1,
    /// Minimal fidelity.
    Low = 2,
    /// Not simulated or rendered.
    #[default]
    Off = 3,
}

impl LodLevel {
    /// Number of LOD tiers, `Off` included.
    pub const COUNT: usize = 4;

    /// Every tier from finest to coarsest.
    pub const ALL: [LodLevel; Self::COUNT] =
        [LodLevel::High, LodLevel::Medium, LodLevel::Low, LodLevel::Off];

    /// Index of this tier in per-tier arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier for an index, clamping anything past the end to `Off`.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => LodLevel::High,
            1 => LodLevel::Medium,
            2 => LodLevel::Low,
            _ => LodLevel::Off,
        }
    }

    /// Numeric value used for significance (`Off` maps to 3.0).
    pub fn as_f32(self) -> f32 {
        self.index() as f32
    }
}

/// Visibility classification of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodVisibility {
    /// Inside (or near) a viewer's view cone.
    CanBeSeen,
    /// Outside every viewer's view cone.
    CulledByFrustum,
    /// Beyond the farthest LOD distance.
    CulledByDistance,
    /// Not computed this frame.
    #[default]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiers order from finest to coarsest.
    #[test]
    fn test_lod_ordering() {
        assert!(LodLevel::High < LodLevel::Medium);
        assert!(LodLevel::Medium < LodLevel::Low);
        assert!(LodLevel::Low < LodLevel::Off);
        assert_eq!(LodLevel::ALL.iter().max(), Some(&LodLevel::Off));
    }

    #[test]
    fn test_index_roundtrip_and_clamp() {
        for lod in LodLevel::ALL {
            assert_eq!(LodLevel::from_index(lod.index()), lod);
        }
        assert_eq!(LodLevel::from_index(17), LodLevel::Off);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LodLevel::default(), LodLevel::Off);
        assert_eq!(LodVisibility::default(), LodVisibility::Unknown);
        assert_eq!(LodLevel::Off.as_f32(), 3.0);
    }
}
