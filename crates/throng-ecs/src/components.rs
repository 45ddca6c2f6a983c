//! Per-entity components read and written by the LOD systems.

use bevy_ecs::prelude::*;
use glam::Vec3;
use throng_lod::{EntityLodInfo, EntityViewerInfo, RepresentationKind};

/// World-space location of a crowd entity.
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position(pub Vec3);

/// Distances and visibility gathered by the collector each frame.
#[derive(Component, Clone, Debug, PartialEq, Default)]
pub struct ViewerInfo(pub EntityViewerInfo);

/// LOD, visibility and significance assigned by the calculator.
#[derive(Component, Clone, Debug, PartialEq, Default)]
pub struct LodInfo(pub EntityLodInfo);

/// How the entity is currently presented. Only written when it changes, so
/// `Changed<Representation>` marks real swaps.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Representation(pub RepresentationKind);

impl Default for Representation {
    fn default() -> Self {
        Self(RepresentationKind::None)
    }
}

/// Everything a crowd entity needs to take part in LOD.
#[derive(Bundle, Clone, Debug, Default)]
pub struct CrowdEntityBundle {
    pub position: Position,
    pub viewer_info: ViewerInfo,
    pub lod_info: LodInfo,
    pub representation: Representation,
}

impl CrowdEntityBundle {
    /// Bundle for an entity at `location` with fresh LOD records.
    pub fn new(location: Vec3) -> Self {
        Self {
            position: Position(location),
            ..Default::default()
        }
    }
}
