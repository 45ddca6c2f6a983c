//! Per-entity distance and view-cone collection.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;

use crate::info::EntityViewerInfo;
use crate::lod::{KINDA_SMALL_NUMBER, MAX_VIEWERS};
use crate::settings::{LodLogic, LodSettings, LodSettingsError};
use crate::viewer::{Viewer, ViewerCache};

/// View cone derived from the FOV settings.
#[derive(Clone, Copy, Debug)]
struct ViewCone {
    fov_radians: f32,
    cos_fov: f32,
    /// Cosine of the widened cone an already visible entity may stay in.
    cos_fov_hysteresis: f32,
}

impl ViewCone {
    fn new(fov_angle_degrees: f32, hysteresis_ratio: f32) -> Self {
        let fov_radians = fov_angle_degrees.to_radians();
        let widened = (fov_radians * (1.0 + hysteresis_ratio)).min(PI);
        Self {
            fov_radians,
            cos_fov: fov_radians.cos(),
            cos_fov_hysteresis: widened.cos(),
        }
    }

    /// Returns whether the entity is visible and its signed distance to the
    /// cone surface (negative inside).
    fn classify(
        &self,
        offset: Vec3,
        distance_sq: f32,
        direction: Vec3,
        was_visible: bool,
    ) -> (bool, f32) {
        let distance = distance_sq.sqrt();
        if distance < KINDA_SMALL_NUMBER {
            return (true, 0.0);
        }

        let dot = direction.dot(offset / distance);
        let visible = dot >= self.cos_fov || (was_visible && dot >= self.cos_fov_hysteresis);

        let angle_outside = dot.clamp(-1.0, 1.0).acos() - self.fov_radians;
        let distance_to_cone = if angle_outside >= FRAC_PI_2 {
            distance
        } else {
            distance * angle_outside.sin()
        };
        (visible, distance_to_cone)
    }
}

/// Fills [`EntityViewerInfo`] for batches of entities.
#[derive(Clone, Debug)]
pub struct LodCollector {
    viewers: ViewerCache,
    cone: Option<ViewCone>,
}

impl LodCollector {
    /// Create a collector.
    ///
    /// # Panics
    ///
    /// Panics if `settings` do not validate against `logic`.
    pub fn new(logic: LodLogic, settings: &LodSettings) -> Self {
        match Self::try_new(logic, settings) {
            Ok(collector) => collector,
            Err(err) => panic!("invalid LOD collector settings: {err}"),
        }
    }

    /// Create a collector, reporting invalid settings.
    pub fn try_new(logic: LodLogic, settings: &LodSettings) -> Result<Self, LodSettingsError> {
        settings.validate(&logic)?;
        let cone = settings.visibility.as_ref().map(|visibility| {
            ViewCone::new(
                visibility.fov_angle_degrees,
                visibility.fov_hysteresis_percentage / 100.0,
            )
        });
        Ok(Self {
            viewers: ViewerCache::new(logic.local_viewers_only),
            cone,
        })
    }

    /// Cache this frame's viewers. Call once per frame before collecting.
    pub fn prepare_execution(&mut self, viewers: &[Viewer]) {
        self.viewers.cache_viewer_information(viewers);
    }

    /// Viewers cached for the current frame.
    pub fn viewers(&self) -> &ViewerCache {
        &self.viewers
    }

    /// Compute distances (and visibility when enabled) for one chunk.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn collect_lod_info(&self, locations: &[Vec3], viewer_info: &mut [EntityViewerInfo]) {
        assert_eq!(
            locations.len(),
            viewer_info.len(),
            "locations and viewer info must be index-aligned"
        );

        for (location, info) in locations.iter().zip(viewer_info.iter_mut()) {
            let mut closest_distance_sq = f32::MAX;
            let mut closest_distance_to_frustum = f32::MAX;

            for slot in 0..MAX_VIEWERS {
                if !self.viewers.is_valid(slot) {
                    info.reset_viewer(slot);
                    continue;
                }
                if self.viewers.needs_clear(slot) {
                    info.reset_viewer(slot);
                }

                let offset = *location - self.viewers.location(slot);
                let distance_sq = offset.length_squared();
                info.distance_to_viewer_sq[slot] = distance_sq;
                closest_distance_sq = closest_distance_sq.min(distance_sq);

                if let Some(cone) = &self.cone {
                    let (visible, distance_to_frustum) = cone.classify(
                        offset,
                        distance_sq,
                        self.viewers.direction(slot),
                        info.is_visible[slot],
                    );
                    info.is_visible[slot] = visible;
                    info.distance_to_frustum[slot] = distance_to_frustum;
                    closest_distance_to_frustum =
                        closest_distance_to_frustum.min(distance_to_frustum);
                }
            }

            info.closest_viewer_distance_sq = closest_distance_sq;
            info.closest_distance_to_frustum = closest_distance_to_frustum;
        }
    }
}
