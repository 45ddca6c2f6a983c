//! Crowd level-of-detail: viewer caching, per-entity distance and visibility
//! collection, bucketed LOD classification with count budgets, and variable
//! tick rates driven by the result.
//!
//! A frame runs in four phases that act as barriers:
//! [`LodCalculator::prepare_execution`], [`LodCalculator::calculate_lod`] over
//! every chunk, [`LodCalculator::adjust_distances_from_count`], then
//! [`LodCalculator::adjust_lod_from_count`] over every chunk when the previous
//! phase returned `true`. [`LodProcessor`] drives the whole sequence.

mod calculator;
mod collector;
mod consumers;
mod info;
mod lod;
mod processor;
mod runtime;
mod settings;
mod tick_rate;
mod viewer;

pub use calculator::{FramePhase, LodCalculator};
pub use collector::LodCollector;
pub use consumers::{LodStats, RepresentationKind, RepresentationLodMap};
pub use info::{EntityLodInfo, EntityViewerInfo};
pub use lod::{BUCKETS_PER_LOD, KINDA_SMALL_NUMBER, LodLevel, LodVisibility, MAX_VIEWERS};
pub use processor::{LodChunk, LodDebugConfig, LodProcessor};
pub use runtime::{FrameCounts, LodBucketCounts, LodRuntimeData};
pub use settings::{LodLogic, LodSettings, LodSettingsError, VisibilitySettings};
pub use tick_rate::{ChunkTickState, TickRateController};
pub use viewer::{ConvexVolume, Viewer, ViewerCache, ViewerHandle};
