//! Per-entity records written by the collector and the calculator.

use crate::lod::{LodLevel, LodVisibility, MAX_VIEWERS};

/// Per-entity distances and visibility relative to each cached viewer.
///
/// Rewritten every frame by [`crate::LodCollector`]. The per-viewer
/// visibility flags survive between frames because the view-cone hysteresis
/// depends on them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityViewerInfo {
    /// Squared distance to the closest valid viewer.
    pub closest_viewer_distance_sq: f32,
    /// Smallest signed distance to any valid viewer's view cone.
    pub closest_distance_to_frustum: f32,
    /// Squared distance to each viewer slot.
    pub distance_to_viewer_sq: [f32; MAX_VIEWERS],
    /// Signed distance to each viewer slot's view cone (negative inside).
    pub distance_to_frustum: [f32; MAX_VIEWERS],
    /// Whether each viewer slot can see the entity.
    pub is_visible: [bool; MAX_VIEWERS],
}

impl EntityViewerInfo {
    /// Forget everything known about one viewer slot.
    pub fn reset_viewer(&mut self, slot: usize) {
        self.distance_to_viewer_sq[slot] = f32::MAX;
        self.distance_to_frustum[slot] = f32::MAX;
        self.is_visible[slot] = false;
    }

    /// Whether any viewer slot can see the entity.
    pub fn is_visible_by_any(&self) -> bool {
        self.is_visible.iter().any(|&visible| visible)
    }
}

impl Default for EntityViewerInfo {
    fn default() -> Self {
        Self {
            closest_viewer_distance_sq: f32::MAX,
            closest_distance_to_frustum: f32::MAX,
            distance_to_viewer_sq: [f32::MAX; MAX_VIEWERS],
            distance_to_frustum: [f32::MAX; MAX_VIEWERS],
            is_visible: [false; MAX_VIEWERS],
        }
    }
}

/// Persistent LOD state of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityLodInfo {
    pub lod: LodLevel,
    /// LOD of the previous frame, `None` on the first classification.
    pub prev_lod: Option<LodLevel>,
    /// Whether `lod` was assigned by the calculator rather than defaulted.
    pub calculated: bool,
    /// Continuous refinement of `lod` in `[0, 3]`.
    pub significance: f32,
    pub visibility: LodVisibility,
    pub prev_visibility: LodVisibility,
    /// `None` for slots that have not classified the entity yet.
    pub lod_per_viewer: [Option<LodLevel>; MAX_VIEWERS],
    pub prev_lod_per_viewer: [Option<LodLevel>; MAX_VIEWERS],
    pub visibility_per_viewer: [LodVisibility; MAX_VIEWERS],
    pub prev_visibility_per_viewer: [LodVisibility; MAX_VIEWERS],
}

impl EntityLodInfo {
    /// Forget the per-viewer state of one viewer slot.
    pub fn reset_viewer(&mut self, slot: usize) {
        self.lod_per_viewer[slot] = None;
        self.prev_lod_per_viewer[slot] = None;
        self.visibility_per_viewer[slot] = LodVisibility::Unknown;
        self.prev_visibility_per_viewer[slot] = LodVisibility::Unknown;
    }

    /// Whether the LOD changed this frame. A first classification counts
    /// as a change.
    pub fn lod_changed(&self) -> bool {
        self.calculated && self.prev_lod != Some(self.lod)
    }
}

impl Default for EntityLodInfo {
    fn default() -> Self {
        Self {
            lod: LodLevel::Off,
            prev_lod: None,
            calculated: false,
            significance: LodLevel::Off.as_f32(),
            visibility: LodVisibility::Unknown,
            prev_visibility: LodVisibility::Unknown,
            lod_per_viewer: [None; MAX_VIEWERS],
            prev_lod_per_viewer: [None; MAX_VIEWERS],
            visibility_per_viewer: [LodVisibility::Unknown; MAX_VIEWERS],
            prev_visibility_per_viewer: [LodVisibility::Unknown; MAX_VIEWERS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_viewer_restores_infinite_distance() {
        let mut info = EntityViewerInfo::default();
        info.distance_to_viewer_sq[1] = 4.0;
        info.distance_to_frustum[1] = -1.0;
        info.is_visible[1] = true;
        assert!(info.is_visible_by_any());

        info.reset_viewer(1);
        assert_eq!(info.distance_to_viewer_sq[1], f32::MAX);
        assert_eq!(info.distance_to_frustum[1], f32::MAX);
        assert!(!info.is_visible_by_any());
    }

    #[test]
    fn test_lod_info_reset_and_change() {
        let mut info = EntityLodInfo::default();
        assert_eq!(info.prev_lod, None);
        assert!(!info.lod_changed());

        // First assignment.
        info.calculated = true;
        info.lod = LodLevel::High;
        assert!(info.lod_changed());

        info.prev_lod = Some(LodLevel::High);
        assert!(!info.lod_changed());
        info.lod = LodLevel::Medium;
        assert!(info.lod_changed());

        info.lod_per_viewer[0] = Some(LodLevel::High);
        info.prev_lod_per_viewer[0] = Some(LodLevel::Medium);
        info.visibility_per_viewer[0] = LodVisibility::CanBeSeen;
        info.reset_viewer(0);
        assert_eq!(info.lod_per_viewer[0], None);
        assert_eq!(info.prev_lod_per_viewer[0], None);
        assert_eq!(info.visibility_per_viewer[0], LodVisibility::Unknown);
    }
}
