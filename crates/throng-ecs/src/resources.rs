//! World resources holding the LOD configuration and per-frame outputs.

use bevy_ecs::prelude::*;
use throng_lod::{
    LodCalculator, LodCollector, LodDebugConfig, LodLogic, LodSettings, LodSettingsError,
    LodStats, RepresentationLodMap, Viewer,
};

/// Viewers considered this frame. Written by whatever drives the cameras.
#[derive(Resource, Clone, Debug, Default)]
pub struct Viewers(pub Vec<Viewer>);

/// Collector and calculator for one LOD configuration.
#[derive(Resource, Clone, Debug)]
pub struct LodState {
    pub collector: LodCollector,
    pub calculator: LodCalculator,
    pub debug: LodDebugConfig,
    /// Set by the distance clamping phase; gates the adjustment pass.
    pub needs_adjustment: bool,
}

impl LodState {
    /// Build the LOD state, reporting settings that do not match `logic`.
    pub fn new(
        logic: LodLogic,
        settings: &LodSettings,
        debug: LodDebugConfig,
    ) -> Result<Self, LodSettingsError> {
        Ok(Self {
            collector: LodCollector::try_new(logic, settings)?,
            calculator: LodCalculator::try_new(logic, settings)?,
            debug,
            needs_adjustment: false,
        })
    }
}

/// Representation chosen for each LOD.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct Representations(pub RepresentationLodMap);

/// Counts of the last completed LOD frame.
#[derive(Resource, Clone, Debug, Default)]
pub struct LodFrameStats(pub LodStats);

/// Insert `state` and the default LOD resources the systems read.
pub fn register_lod_resources(world: &mut World, state: LodState) {
    world.insert_resource(state);
    world.insert_resource(Viewers::default());
    world.insert_resource(Representations::default());
    world.insert_resource(LodFrameStats::default());
}
