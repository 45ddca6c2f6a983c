//! ECS integration for crowd LOD.
//!
//! Entities carry their position and per-entity LOD records as components;
//! the collector and calculator live in a [`LodState`] resource. The systems
//! registered by [`register_lod_systems`] run the LOD frame phases in order
//! and then hand the result to representation and stats consumers.

mod components;
mod resources;
mod systems;

pub use components::{CrowdEntityBundle, LodInfo, Position, Representation, ViewerInfo};
pub use resources::{
    LodFrameStats, LodState, Representations, Viewers, register_lod_resources,
};
pub use systems::{
    LodSet, adjust_distances_from_count, adjust_lod_from_count, calculate_lod, collect_lod_info,
    prepare_lod, record_lod_stats, register_lod_systems, update_representation,
};
