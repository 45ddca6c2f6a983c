//! What downstream systems do with a LOD: representation choice and frame
//! statistics.

use serde::{Deserialize, Serialize};

use crate::info::EntityLodInfo;
use crate::lod::{LodLevel, LodVisibility};

/// How an entity is presented at a given LOD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationKind {
    /// Full actor with high-resolution assets.
    HighResSpawnedActor,
    /// Full actor with reduced assets.
    LowResSpawnedActor,
    /// Instanced static mesh.
    StaticMeshInstance,
    /// Not represented.
    None,
}

/// Representation chosen for each LOD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepresentationLodMap(pub [RepresentationKind; LodLevel::COUNT]);

impl RepresentationLodMap {
    /// Representation for `lod`.
    pub fn representation(&self, lod: LodLevel) -> RepresentationKind {
        self.0[lod.index()]
    }
}

impl Default for RepresentationLodMap {
    fn default() -> Self {
        Self([
            RepresentationKind::HighResSpawnedActor,
            RepresentationKind::LowResSpawnedActor,
            RepresentationKind::StaticMeshInstance,
            RepresentationKind::None,
        ])
    }
}

/// Entity counts of one frame, broken down by LOD and visibility.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LodStats {
    pub entities: usize,
    pub per_lod: [usize; LodLevel::COUNT],
    /// Indexed as `CanBeSeen`, `CulledByFrustum`, `CulledByDistance`, `Unknown`.
    pub per_visibility: [usize; 4],
    /// Entities whose LOD changed this frame.
    pub changed: usize,
}

impl LodStats {
    /// Stats over a slice of LOD records.
    pub fn from_lods(lods: &[EntityLodInfo]) -> Self {
        let mut stats = Self::default();
        for info in lods {
            stats.record(info);
        }
        stats
    }

    /// Count one entity.
    pub fn record(&mut self, info: &EntityLodInfo) {
        self.entities += 1;
        self.per_lod[info.lod.index()] += 1;
        self.per_visibility[visibility_index(info.visibility)] += 1;
        if info.lod_changed() {
            self.changed += 1;
        }
    }

    /// Add another set of stats into this one.
    pub fn merge(&mut self, other: &LodStats) {
        self.entities += other.entities;
        self.changed += other.changed;
        for (dst, src) in self.per_lod.iter_mut().zip(other.per_lod) {
            *dst += src;
        }
        for (dst, src) in self.per_visibility.iter_mut().zip(other.per_visibility) {
            *dst += src;
        }
    }

    /// Entities at `lod`.
    pub fn count(&self, lod: LodLevel) -> usize {
        self.per_lod[lod.index()]
    }

    /// Entities with the given visibility.
    pub fn visibility_count(&self, visibility: LodVisibility) -> usize {
        self.per_visibility[visibility_index(visibility)]
    }

    /// Entities that would be represented by `kind` under `map`.
    pub fn representation_count(&self, map: &RepresentationLodMap, kind: RepresentationKind) -> usize {
        LodLevel::ALL
            .iter()
            .filter(|&&lod| map.representation(lod) == kind)
            .map(|&lod| self.count(lod))
            .sum()
    }
}

fn visibility_index(visibility: LodVisibility) -> usize {
    match visibility {
        LodVisibility::CanBeSeen => 0,
        LodVisibility::CulledByFrustum => 1,
        LodVisibility::CulledByDistance => 2,
        LodVisibility::Unknown => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(lod: LodLevel, prev_lod: LodLevel, visibility: LodVisibility) -> EntityLodInfo {
        EntityLodInfo {
            lod,
            prev_lod: Some(prev_lod),
            calculated: true,
            visibility,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_representation_map() {
        let map = RepresentationLodMap::default();
        assert_eq!(
            map.representation(LodLevel::High),
            RepresentationKind::HighResSpawnedActor
        );
        assert_eq!(map.representation(LodLevel::Off), RepresentationKind::None);
    }

    #[test]
    fn test_stats_counts() {
        let lods = [
            info(LodLevel::High, LodLevel::High, LodVisibility::CanBeSeen),
            info(LodLevel::High, LodLevel::Medium, LodVisibility::CanBeSeen),
            info(LodLevel::Low, LodLevel::Low, LodVisibility::CulledByFrustum),
            info(LodLevel::Off, LodLevel::Low, LodVisibility::CulledByDistance),
        ];
        let stats = LodStats::from_lods(&lods);
        assert_eq!(stats.entities, 4);
        assert_eq!(stats.count(LodLevel::High), 2);
        assert_eq!(stats.count(LodLevel::Medium), 0);
        assert_eq!(stats.changed, 2);
        assert_eq!(stats.visibility_count(LodVisibility::CanBeSeen), 2);

        let map = RepresentationLodMap::default();
        assert_eq!(
            stats.representation_count(&map, RepresentationKind::HighResSpawnedActor),
            2
        );
        assert_eq!(stats.representation_count(&map, RepresentationKind::None), 1);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = LodStats::from_lods(&[info(LodLevel::High, LodLevel::Off, LodVisibility::Unknown)]);
        let b = LodStats::from_lods(&[info(LodLevel::Off, LodLevel::Off, LodVisibility::Unknown)]);
        a.merge(&b);
        assert_eq!(a.entities, 2);
        assert_eq!(a.changed, 1);
        assert_eq!(a.visibility_count(LodVisibility::Unknown), 2);
    }
}
