//! Frame driver running collection, classification and count clamping over
//! chunks in parallel.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::calculator::LodCalculator;
use crate::collector::LodCollector;
use crate::consumers::LodStats;
use crate::info::{EntityLodInfo, EntityViewerInfo};
use crate::lod::LodLevel;
use crate::runtime::FrameCounts;
use crate::settings::{LodLogic, LodSettings, LodSettingsError};
use crate::viewer::Viewer;

/// Developer toggles, passed explicitly into each frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodDebugConfig {
    /// Skip all distance work and put every entity at `Off`.
    pub force_off: bool,
    /// Log per-frame LOD counts at info level instead of trace.
    pub log_stats: bool,
}

/// Index-aligned view of one chunk of entities.
#[derive(Debug)]
pub struct LodChunk<'a> {
    pub locations: &'a [Vec3],
    pub viewer_info: &'a mut [EntityViewerInfo],
    pub lod: &'a mut [EntityLodInfo],
}

impl<'a> LodChunk<'a> {
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn new(
        locations: &'a [Vec3],
        viewer_info: &'a mut [EntityViewerInfo],
        lod: &'a mut [EntityLodInfo],
    ) -> Self {
        assert!(
            locations.len() == viewer_info.len() && viewer_info.len() == lod.len(),
            "chunk arrays must be index-aligned"
        );
        Self {
            locations,
            viewer_info,
            lod,
        }
    }

    /// Number of entities in the chunk.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the chunk holds no entities.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Owns one LOD configuration and runs its frames.
#[derive(Clone, Debug)]
pub struct LodProcessor {
    collector: LodCollector,
    calculator: LodCalculator,
}

impl LodProcessor {
    /// # Panics
    ///
    /// Panics if `settings` do not validate against `logic`.
    pub fn new(logic: LodLogic, settings: &LodSettings) -> Self {
        Self {
            collector: LodCollector::new(logic, settings),
            calculator: LodCalculator::new(logic, settings),
        }
    }

    /// Build a processor, reporting invalid settings.
    pub fn try_new(logic: LodLogic, settings: &LodSettings) -> Result<Self, LodSettingsError> {
        Ok(Self {
            collector: LodCollector::try_new(logic, settings)?,
            calculator: LodCalculator::try_new(logic, settings)?,
        })
    }

    pub fn collector(&self) -> &LodCollector {
        &self.collector
    }

    pub fn calculator(&self) -> &LodCalculator {
        &self.calculator
    }

    /// Run a full frame over `chunks` and return the resulting counts.
    ///
    /// Chunks are collected and classified in parallel, each worker filling
    /// its own partial bucket counts; the sums are clamped sequentially and
    /// the adjustment pass runs in parallel again.
    pub fn execute(
        &mut self,
        viewers: &[Viewer],
        chunks: &mut [LodChunk<'_>],
        debug: &LodDebugConfig,
    ) -> LodStats {
        if debug.force_off {
            let calculator = &self.calculator;
            chunks
                .par_iter_mut()
                .for_each(|chunk| calculator.force_off_lod(chunk.lod));
            return self.report(chunks, debug);
        }

        self.collector.prepare_execution(viewers);
        self.calculator.prepare_execution(viewers);

        let collector = &self.collector;
        let calculator = &self.calculator;
        let counts = chunks
            .par_iter_mut()
            .fold(
                || calculator.new_frame_counts(),
                |mut counts, chunk| {
                    collector.collect_lod_info(chunk.locations, chunk.viewer_info);
                    calculator.classify(chunk.viewer_info, chunk.lod, &mut counts);
                    counts
                },
            )
            .reduce(FrameCounts::default, |mut total, partial| {
                total.merge(&partial);
                total
            });
        self.calculator.merge_counts(&counts);

        if self.calculator.adjust_distances_from_count() {
            let calculator = &self.calculator;
            chunks
                .par_iter_mut()
                .for_each(|chunk| calculator.adjust_lod_from_count(chunk.viewer_info, chunk.lod));
        }

        self.report(chunks, debug)
    }

    fn report(&self, chunks: &[LodChunk<'_>], debug: &LodDebugConfig) -> LodStats {
        let stats = chunks
            .par_iter()
            .map(|chunk| LodStats::from_lods(chunk.lod))
            .reduce(LodStats::default, |mut total, partial| {
                total.merge(&partial);
                total
            });

        let [high, medium, low, off] = stats.per_lod;
        if debug.log_stats {
            info!(entities = stats.entities, high, medium, low, off, changed = stats.changed, "LOD frame");
        } else {
            trace!(entities = stats.entities, high, medium, low, off, changed = stats.changed, "LOD frame");
        }
        debug_assert_eq!(
            stats.per_lod.iter().sum::<usize>(),
            stats.entities,
            "every entity has one of {} LODs",
            LodLevel::COUNT
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::LodVisibility;
    use crate::settings::VisibilitySettings;
    use crate::viewer::ViewerHandle;

    struct Crowd {
        locations: Vec<Vec3>,
        viewer_info: Vec<EntityViewerInfo>,
        lod: Vec<EntityLodInfo>,
    }

    impl Crowd {
        fn new(count: usize) -> Self {
            let locations = (0..count)
                .map(|i| {
                    let angle = i as f32 * 0.7;
                    let radius = (i * 53 % 12000) as f32 + 5.5;
                    Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
                })
                .collect();
            Self {
                locations,
                viewer_info: vec![EntityViewerInfo::default(); count],
                lod: vec![EntityLodInfo::default(); count],
            }
        }

        fn chunks(&mut self, chunk_size: usize) -> Vec<LodChunk<'_>> {
            self.locations
                .chunks(chunk_size)
                .zip(self.viewer_info.chunks_mut(chunk_size))
                .zip(self.lod.chunks_mut(chunk_size))
                .map(|((locations, viewer_info), lod)| LodChunk::new(locations, viewer_info, lod))
                .collect()
        }
    }

    fn viewers() -> Vec<Viewer> {
        vec![Viewer::new(ViewerHandle::new(0, 1), Vec3::ZERO, Vec3::X)]
    }

    fn capped_settings() -> LodSettings {
        LodSettings {
            lod_max_count: [40, 80, 120, u32::MAX],
            visibility: Some(VisibilitySettings::default()),
            ..Default::default()
        }
    }

    fn visibility_logic() -> LodLogic {
        LodLogic {
            do_visibility: true,
            ..Default::default()
        }
    }

    /// The parallel chunked frame matches a single sequential pass.
    #[test]
    fn test_parallel_matches_sequential() {
        let settings = capped_settings();
        let logic = visibility_logic();

        let mut parallel = Crowd::new(600);
        let mut processor = LodProcessor::new(logic, &settings);
        let stats = {
            let mut chunks = parallel.chunks(64);
            processor.execute(&viewers(), &mut chunks, &LodDebugConfig::default())
        };

        let mut sequential = Crowd::new(600);
        let mut collector = LodCollector::new(logic, &settings);
        let mut calculator = LodCalculator::new(logic, &settings);
        collector.prepare_execution(&viewers());
        calculator.prepare_execution(&viewers());
        collector.collect_lod_info(&sequential.locations, &mut sequential.viewer_info);
        calculator.calculate_lod(&sequential.viewer_info, &mut sequential.lod);
        if calculator.adjust_distances_from_count() {
            calculator.adjust_lod_from_count(&sequential.viewer_info, &mut sequential.lod);
        }

        assert_eq!(parallel.lod, sequential.lod);
        assert_eq!(stats, LodStats::from_lods(&sequential.lod));
        assert_eq!(stats.entities, 600);
    }

    #[test]
    fn test_budgets_respected_across_chunks() {
        let mut crowd = Crowd::new(1000);
        let mut processor = LodProcessor::new(LodLogic::default(), &LodSettings {
            lod_max_count: [25, 50, 100, u32::MAX],
            ..Default::default()
        });
        let stats = {
            let mut chunks = crowd.chunks(100);
            processor.execute(&viewers(), &mut chunks, &LodDebugConfig::default())
        };
        assert!(stats.count(LodLevel::High) <= 25, "{stats:?}");
        assert!(stats.count(LodLevel::Medium) <= 50, "{stats:?}");
        assert!(stats.count(LodLevel::Low) <= 100, "{stats:?}");
    }

    #[test]
    fn test_force_off_skips_distance_work() {
        let mut crowd = Crowd::new(50);
        let mut processor = LodProcessor::new(visibility_logic(), &capped_settings());
        let debug = LodDebugConfig {
            force_off: true,
            log_stats: true,
        };
        let stats = {
            let mut chunks = crowd.chunks(16);
            processor.execute(&viewers(), &mut chunks, &debug)
        };

        assert_eq!(stats.count(LodLevel::Off), 50);
        assert_eq!(stats.visibility_count(LodVisibility::Unknown), 50);
        assert!(
            crowd
                .viewer_info
                .iter()
                .all(|info| info.closest_viewer_distance_sq == f32::MAX)
        );
    }

    #[test]
    fn test_empty_frame() {
        let mut processor = LodProcessor::new(LodLogic::default(), &LodSettings::default());
        let stats = processor.execute(&viewers(), &mut [], &LodDebugConfig::default());
        assert_eq!(stats, LodStats::default());
    }

    #[test]
    #[should_panic(expected = "index-aligned")]
    fn test_misaligned_chunk_panics() {
        let locations = [Vec3::ZERO];
        let mut viewer_info = [];
        let mut lod = [EntityLodInfo::default()];
        LodChunk::new(&locations, &mut viewer_info, &mut lod);
    }
}
