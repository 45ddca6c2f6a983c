//! LOD configuration: feature flags, distance tiers and count budgets.

use serde::{Deserialize, Serialize};

use crate::lod::LodLevel;

/// Feature flags selecting which optional LOD paths run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodLogic {
    /// Classify visible entities against their own distance tiers.
    pub do_visibility: bool,
    /// Compute an independent LOD for every viewer.
    pub calculate_per_viewer_lod: bool,
    /// Enforce count budgets per viewer as well. Requires per-viewer LOD.
    pub maximize_count_per_viewer: bool,
    /// Write the continuous significance value.
    pub calculate_significance: bool,
    /// Ignore remote viewers.
    pub local_viewers_only: bool,
}

impl Default for LodLogic {
    fn default() -> Self {
        Self {
            do_visibility: false,
            calculate_per_viewer_lod: false,
            maximize_count_per_viewer: false,
            calculate_significance: true,
            local_viewers_only: false,
        }
    }
}

/// Distance tiers and view-cone parameters used when visibility logic is on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    /// Tier distances for visible entities. `[0]` is forced to zero.
    pub visible_lod_distance: [f32; LodLevel::COUNT],
    /// Half angle of the view cone in degrees.
    pub fov_angle_degrees: f32,
    /// Extra angle, in percent of the FOV, an already visible entity keeps.
    pub fov_hysteresis_percentage: f32,
    /// Entities closer than this to a view cone count as visible.
    pub distance_to_frustum: f32,
    /// Extra distance an already visible entity keeps.
    pub distance_to_frustum_hysteresis: f32,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            visible_lod_distance: [0.0, 2000.0, 4000.0, 15000.0],
            fov_angle_degrees: 45.0,
            fov_hysteresis_percentage: 10.0,
            distance_to_frustum: 0.0,
            distance_to_frustum_hysteresis: 200.0,
        }
    }
}

/// Distance tiers and count budgets of one LOD configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    /// Lower distance bound of each tier. `[0]` is forced to zero.
    pub base_lod_distance: [f32; LodLevel::COUNT],
    /// Hysteresis band, in percent of a tier's width, resisting upgrades.
    pub buffer_hysteresis_on_distance_percentage: f32,
    /// Maximum entities per tier across all viewers. `u32::MAX` is unlimited.
    pub lod_max_count: [u32; LodLevel::COUNT],
    /// Maximum entities per tier for each viewer.
    pub lod_max_count_per_viewer: Option<[u32; LodLevel::COUNT]>,
    /// View-cone settings.
    pub visibility: Option<VisibilitySettings>,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            base_lod_distance: [0.0, 1000.0, 2500.0, 10000.0],
            buffer_hysteresis_on_distance_percentage: 10.0,
            lod_max_count: [u32::MAX; LodLevel::COUNT],
            lod_max_count_per_viewer: None,
            visibility: None,
        }
    }
}

/// Reasons a [`LodSettings`] cannot be used with a [`LodLogic`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodSettingsError {
    #[error("visibility settings must be provided exactly when visibility logic is enabled")]
    VisibilityMismatch,

    #[error("per-viewer max counts must be provided exactly when maximizing count per viewer")]
    PerViewerCountMismatch,

    #[error("maximizing count per viewer requires per-viewer LOD")]
    PerViewerLodRequired,

    #[error("{name} distances must be finite, non-negative and non-decreasing: {distances:?}")]
    InvalidDistances {
        name: &'static str,
        distances: [f32; LodLevel::COUNT],
    },

    #[error("{name} must be in [0, 100), got {value}")]
    InvalidPercentage { name: &'static str, value: f32 },

    #[error("fov angle must be in (0, 180) degrees, got {0}")]
    InvalidFov(f32),

    #[error("fov hysteresis percentage must be in (0, 100), got {0}")]
    InvalidFovHysteresis(f32),

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidDistance { name: &'static str, value: f32 },
}

impl LodSettings {
    /// Check that the optional groups match `logic` and that every value is usable.
    pub fn validate(&self, logic: &LodLogic) -> Result<(), LodSettingsError> {
        if self.visibility.is_some() != logic.do_visibility {
            return Err(LodSettingsError::VisibilityMismatch);
        }
        if logic.maximize_count_per_viewer && !logic.calculate_per_viewer_lod {
            return Err(LodSettingsError::PerViewerLodRequired);
        }
        if self.lod_max_count_per_viewer.is_some() != logic.maximize_count_per_viewer {
            return Err(LodSettingsError::PerViewerCountMismatch);
        }

        check_distances("base LOD", &self.base_lod_distance)?;
        check_percentage(
            "buffer hysteresis percentage",
            self.buffer_hysteresis_on_distance_percentage,
        )?;

        if let Some(visibility) = &self.visibility {
            check_distances("visible LOD", &visibility.visible_lod_distance)?;
            if !(visibility.fov_angle_degrees > 0.0 && visibility.fov_angle_degrees < 180.0) {
                return Err(LodSettingsError::InvalidFov(visibility.fov_angle_degrees));
            }
            let fov_hysteresis = visibility.fov_hysteresis_percentage;
            if !(fov_hysteresis > 0.0 && fov_hysteresis < 100.0) {
                return Err(LodSettingsError::InvalidFovHysteresis(fov_hysteresis));
            }
            check_non_negative("distance to frustum", visibility.distance_to_frustum)?;
            check_non_negative(
                "distance to frustum hysteresis",
                visibility.distance_to_frustum_hysteresis,
            )?;
        }
        Ok(())
    }

    /// Hysteresis ratio in `[0, 1)`.
    pub fn hysteresis_ratio(&self) -> f32 {
        self.buffer_hysteresis_on_distance_percentage / 100.0
    }
}

fn check_distances(
    name: &'static str,
    distances: &[f32; LodLevel::COUNT],
) -> Result<(), LodSettingsError> {
    // Entry 0 is overwritten with zero, so only the tail has to be ordered.
    let valid = distances.iter().all(|d| d.is_finite() && *d >= 0.0)
        && distances[1..].windows(2).all(|pair| pair[0] <= pair[1]);
    if valid {
        Ok(())
    } else {
        Err(LodSettingsError::InvalidDistances {
            name,
            distances: *distances,
        })
    }
}

fn check_percentage(name: &'static str, value: f32) -> Result<(), LodSettingsError> {
    if (0.0..100.0).contains(&value) {
        Ok(())
    } else {
        Err(LodSettingsError::InvalidPercentage { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f32) -> Result<(), LodSettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LodSettingsError::InvalidDistance { name, value })
    }
}
