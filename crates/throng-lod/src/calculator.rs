//! Distance-tier LOD classification with count budgets and hysteresis.

use tracing::debug;

use crate::info::{EntityLodInfo, EntityViewerInfo};
use crate::lod::{BUCKETS_PER_LOD, LodLevel, LodVisibility, MAX_VIEWERS};
use crate::runtime::{FrameCounts, LodBucketCounts, LodRuntimeData, TierDistances};
use crate::settings::{LodLogic, LodSettings, LodSettingsError};
use crate::viewer::{Viewer, ViewerCache};

/// Where the calculator is within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    /// Nothing prepared yet.
    Idle,
    /// `prepare_execution` ran; counts are empty.
    Prepared,
    /// At least one chunk was classified.
    Calculated,
    /// Distances were clamped; the flag tells whether any moved.
    DistancesAdjusted { needs_adjustment: bool },
}

/// Converts [`EntityViewerInfo`] into [`EntityLodInfo`].
#[derive(Clone, Debug)]
pub struct LodCalculator {
    logic: LodLogic,
    base: TierDistances,
    visible: TierDistances,
    hysteresis_ratio: f32,
    lod_max_count: [u32; LodLevel::COUNT],
    lod_max_count_per_viewer: [u32; LodLevel::COUNT],
    distance_to_frustum: f32,
    distance_to_frustum_hysteresis: f32,
    max_lod_distance: f32,
    max_lod_distance_sq: f32,
    viewers: ViewerCache,
    runtime: LodRuntimeData,
    per_viewer_runtime: Vec<LodRuntimeData>,
    scratch: FrameCounts,
    phase: FramePhase,
}

impl LodCalculator {
    /// Create a calculator.
    ///
    /// # Panics
    ///
    /// Panics if `settings` do not validate against `logic`.
    pub fn new(logic: LodLogic, settings: &LodSettings) -> Self {
        match Self::try_new(logic, settings) {
            Ok(calculator) => calculator,
            Err(err) => panic!("invalid LOD calculator settings: {err}"),
        }
    }

    /// Create a calculator, reporting invalid settings.
    pub fn try_new(logic: LodLogic, settings: &LodSettings) -> Result<Self, LodSettingsError> {
        settings.validate(&logic)?;

        let base = TierDistances::new(settings.base_lod_distance);
        let visible = settings
            .visibility
            .as_ref()
            .map_or(base, |v| TierDistances::new(v.visible_lod_distance));
        let off = LodLevel::Off.index();
        let max_lod_distance = base.distance[off].max(visible.distance[off]);

        let (distance_to_frustum, distance_to_frustum_hysteresis) = settings
            .visibility
            .as_ref()
            .map_or((0.0, 0.0), |v| {
                (v.distance_to_frustum, v.distance_to_frustum_hysteresis)
            });

        let runtime = LodRuntimeData::new(&base, &visible);
        let per_viewer_runtime = if logic.maximize_count_per_viewer {
            vec![runtime.clone(); MAX_VIEWERS]
        } else {
            Vec::new()
        };

        Ok(Self {
            logic,
            base,
            visible,
            hysteresis_ratio: settings.hysteresis_ratio(),
            lod_max_count: settings.lod_max_count,
            lod_max_count_per_viewer: settings
                .lod_max_count_per_viewer
                .unwrap_or([u32::MAX; LodLevel::COUNT]),
            distance_to_frustum,
            distance_to_frustum_hysteresis,
            max_lod_distance,
            max_lod_distance_sq: max_lod_distance * max_lod_distance,
            viewers: ViewerCache::new(logic.local_viewers_only),
            runtime,
            per_viewer_runtime,
            scratch: FrameCounts::new(logic.maximize_count_per_viewer),
            phase: FramePhase::Idle,
        })
    }

    /// Feature flags this calculator was built with.
    pub fn logic(&self) -> &LodLogic {
        &self.logic
    }

    /// Farthest configured LOD distance across base and visible tiers.
    pub fn max_lod_distance(&self) -> f32 {
        self.max_lod_distance
    }

    /// Current phase of the frame.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Aggregate runtime data of the current frame.
    pub fn runtime_data(&self) -> &LodRuntimeData {
        &self.runtime
    }

    /// Runtime data of one viewer slot, when maximizing count per viewer.
    pub fn viewer_runtime_data(&self, slot: usize) -> Option<&LodRuntimeData> {
        self.per_viewer_runtime.get(slot)
    }

    /// Viewers cached for the current frame.
    pub fn viewers(&self) -> &ViewerCache {
        &self.viewers
    }

    /// Start a frame: zero the counts, undo last frame's clamping and cache
    /// the viewers.
    pub fn prepare_execution(&mut self, viewers: &[Viewer]) {
        self.viewers.cache_viewer_information(viewers);
        self.runtime.reset(&self.base, &self.visible);
        for data in &mut self.per_viewer_runtime {
            data.reset(&self.base, &self.visible);
        }
        self.phase = FramePhase::Prepared;
    }

    /// Zeroed partial counts matching this calculator's configuration.
    pub fn new_frame_counts(&self) -> FrameCounts {
        FrameCounts::new(self.logic.maximize_count_per_viewer)
    }

    /// Classify one chunk and accumulate its bucket counts.
    pub fn calculate_lod(&mut self, viewer_info: &[EntityViewerInfo], lod: &mut [EntityLodInfo]) {
        let mut counts = std::mem::take(&mut self.scratch);
        counts.reset(self.logic.maximize_count_per_viewer);
        self.classify(viewer_info, lod, &mut counts);
        self.merge_counts(&counts);
        self.scratch = counts;
    }

    /// Classify one chunk, accumulating into caller-owned `counts`.
    ///
    /// Takes `&self` so chunks can be classified in parallel; the partial
    /// counts are folded back with [`Self::merge_counts`].
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn classify(
        &self,
        viewer_info: &[EntityViewerInfo],
        lod: &mut [EntityLodInfo],
        counts: &mut FrameCounts,
    ) {
        debug_assert!(
            matches!(self.phase, FramePhase::Prepared | FramePhase::Calculated),
            "classify called in phase {:?}",
            self.phase
        );
        assert_eq!(
            viewer_info.len(),
            lod.len(),
            "viewer info and LOD info must be index-aligned"
        );

        for (viewer, entity) in viewer_info.iter().zip(lod.iter_mut()) {
            entity.prev_lod = entity.calculated.then_some(entity.lod);
            entity.calculated = true;

            let is_visible = if self.logic.do_visibility {
                entity.prev_visibility = entity.visibility;
                entity.visibility = self.compute_visibility(
                    entity.prev_visibility,
                    viewer.closest_distance_to_frustum,
                    viewer.closest_viewer_distance_sq,
                );
                entity.visibility == LodVisibility::CanBeSeen
            } else {
                false
            };

            if self.logic.calculate_per_viewer_lod {
                self.calculate_per_viewer_lod(viewer, entity, counts);
            }

            let distance_sq = viewer.closest_viewer_distance_sq;
            let new_lod =
                self.compute_lod_from_settings(entity.prev_lod, distance_sq, is_visible, &self.runtime);
            entity.lod = new_lod;
            self.accumulate(&mut counts.aggregate, new_lod, distance_sq, is_visible);

            if self.logic.calculate_significance {
                entity.significance =
                    self.compute_significance(new_lod, distance_sq, is_visible, &self.runtime);
            }
        }
    }

    fn calculate_per_viewer_lod(
        &self,
        viewer: &EntityViewerInfo,
        entity: &mut EntityLodInfo,
        counts: &mut FrameCounts,
    ) {
        for slot in 0..MAX_VIEWERS {
            if !self.viewers.is_valid(slot) {
                entity.reset_viewer(slot);
                continue;
            }
            if self.viewers.needs_clear(slot) {
                entity.reset_viewer(slot);
            }

            entity.prev_lod_per_viewer[slot] = entity.lod_per_viewer[slot];
            entity.prev_visibility_per_viewer[slot] = entity.visibility_per_viewer[slot];

            let distance_sq = viewer.distance_to_viewer_sq[slot];
            let viewer_visible = self.logic.do_visibility && viewer.is_visible[slot];
            if self.logic.do_visibility {
                entity.visibility_per_viewer[slot] = if distance_sq >= self.max_lod_distance_sq {
                    LodVisibility::CulledByDistance
                } else if viewer_visible {
                    LodVisibility::CanBeSeen
                } else {
                    LodVisibility::CulledByFrustum
                };
            }

            let viewer_lod = self.compute_lod_from_settings(
                entity.prev_lod_per_viewer[slot],
                distance_sq,
                viewer_visible,
                self.first_pass_viewer_data(slot),
            );
            entity.lod_per_viewer[slot] = Some(viewer_lod);

            if let Some(viewer_counts) = counts.per_viewer.get_mut(slot) {
                self.accumulate(viewer_counts, viewer_lod, distance_sq, viewer_visible);
            }
        }
    }

    /// Thresholds for a viewer slot during the first pass. Without per-viewer
    /// budgets there is no per-viewer data; the aggregate thresholds are
    /// still unclamped at this point, so they stand in for every slot.
    fn first_pass_viewer_data(&self, slot: usize) -> &LodRuntimeData {
        self.per_viewer_runtime.get(slot).unwrap_or(&self.runtime)
    }

    /// Fold one chunk's partial counts into the frame totals.
    pub fn merge_counts(&mut self, counts: &FrameCounts) {
        debug_assert!(
            matches!(self.phase, FramePhase::Prepared | FramePhase::Calculated),
            "merge_counts called in phase {:?}",
            self.phase
        );
        self.runtime.counts.merge(&counts.aggregate);
        for (data, viewer_counts) in self.per_viewer_runtime.iter_mut().zip(&counts.per_viewer) {
            data.counts.merge(viewer_counts);
        }
        self.phase = FramePhase::Calculated;
    }

    /// Tighten thresholds wherever a tier holds more entities than its budget.
    ///
    /// Returns `true` if [`Self::adjust_lod_from_count`] has to run.
    pub fn adjust_distances_from_count(&mut self) -> bool {
        debug_assert!(
            matches!(self.phase, FramePhase::Prepared | FramePhase::Calculated),
            "adjust_distances_from_count called in phase {:?}",
            self.phase
        );

        let mut needs_adjustment =
            self.runtime
                .adjust_distances_from_count(&self.lod_max_count, &self.base, &self.visible);

        for (slot, data) in self.per_viewer_runtime.iter_mut().enumerate() {
            if self.viewers.is_valid(slot) {
                needs_adjustment |= data.adjust_distances_from_count(
                    &self.lod_max_count_per_viewer,
                    &self.base,
                    &self.visible,
                );
            }
        }

        if needs_adjustment {
            debug!(
                base = ?self.runtime.distances(false),
                visible = ?self.runtime.distances(true),
                "LOD distances clamped by count"
            );
        }
        self.phase = FramePhase::DistancesAdjusted { needs_adjustment };
        needs_adjustment
    }

    /// Reclassify one chunk against the clamped thresholds.
    ///
    /// Only ever moves an entity to a coarser LOD than the first pass gave it.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn adjust_lod_from_count(&self, viewer_info: &[EntityViewerInfo], lod: &mut [EntityLodInfo]) {
        debug_assert!(
            matches!(
                self.phase,
                FramePhase::DistancesAdjusted {
                    needs_adjustment: true
                }
            ),
            "adjust_lod_from_count called in phase {:?}",
            self.phase
        );
        assert_eq!(
            viewer_info.len(),
            lod.len(),
            "viewer info and LOD info must be index-aligned"
        );

        let maximize_per_viewer =
            self.logic.calculate_per_viewer_lod && self.logic.maximize_count_per_viewer;

        for (viewer, entity) in viewer_info.iter().zip(lod.iter_mut()) {
            let is_visible =
                self.logic.do_visibility && entity.visibility == LodVisibility::CanBeSeen;

            let mut highest_viewer_lod = None;
            if maximize_per_viewer {
                for slot in self.viewers.valid_slots() {
                    let viewer_visible = self.logic.do_visibility && viewer.is_visible[slot];
                    let clamped = self.compute_lod_from_settings(
                        entity.prev_lod_per_viewer[slot],
                        viewer.distance_to_viewer_sq[slot],
                        viewer_visible,
                        &self.per_viewer_runtime[slot],
                    );
                    let viewer_lod =
                        entity.lod_per_viewer[slot].map_or(clamped, |first| clamped.max(first));
                    entity.lod_per_viewer[slot] = Some(viewer_lod);
                    highest_viewer_lod = Some(
                        highest_viewer_lod.map_or(viewer_lod, |best: LodLevel| best.min(viewer_lod)),
                    );
                }
            }

            let distance_sq = viewer.closest_viewer_distance_sq;
            let mut new_lod = self
                .compute_lod_from_settings(entity.prev_lod, distance_sq, is_visible, &self.runtime)
                .max(entity.lod);
            if let Some(highest) = highest_viewer_lod {
                new_lod = new_lod.max(highest);
            }
            entity.lod = new_lod;

            if self.logic.calculate_significance {
                entity.significance =
                    self.compute_significance(new_lod, distance_sq, is_visible, &self.runtime);
            }
        }
    }

    /// Put every entity at `Off` with unknown visibility.
    pub fn force_off_lod(&self, lod: &mut [EntityLodInfo]) {
        for entity in lod {
            entity.prev_lod = entity.calculated.then_some(entity.lod);
            entity.calculated = true;
            entity.lod = LodLevel::Off;
            entity.significance = LodLevel::Off.as_f32();
            entity.visibility = LodVisibility::Unknown;
            entity.prev_visibility = LodVisibility::Unknown;
            if self.logic.calculate_per_viewer_lod {
                for slot in 0..MAX_VIEWERS {
                    entity.prev_lod_per_viewer[slot] = entity.lod_per_viewer[slot];
                    entity.lod_per_viewer[slot] = Some(LodLevel::Off);
                    entity.visibility_per_viewer[slot] = LodVisibility::Unknown;
                    entity.prev_visibility_per_viewer[slot] = LodVisibility::Unknown;
                }
            }
        }
    }

    /// Pick the coarsest tier whose start the distance reaches.
    ///
    /// Upgrading by exactly one tier is refused while the entity is still
    /// within the hysteresis band below the previous tier's start. Without a
    /// previous LOD the distance alone decides.
    fn compute_lod_from_settings(
        &self,
        prev_lod: Option<LodLevel>,
        distance_sq: f32,
        is_visible: bool,
        data: &LodRuntimeData,
    ) -> LodLevel {
        let distances_sq = data.distances_sq(is_visible);
        let mut tier = (1..LodLevel::COUNT)
            .rev()
            .find(|&tier| distance_sq >= distances_sq[tier])
            .unwrap_or(LodLevel::High.index());

        if prev_lod.is_some_and(|prev| prev.index() == tier + 1) {
            let distances = data.distances(is_visible);
            let start = distances[tier];
            let hysteresis_distance =
                start + (distances[tier + 1] - start) * (1.0 - self.hysteresis_ratio);
            if distance_sq >= hysteresis_distance * hysteresis_distance {
                tier += 1;
            }
        }
        LodLevel::from_index(tier)
    }

    fn compute_visibility(
        &self,
        prev_visibility: LodVisibility,
        distance_to_frustum: f32,
        closest_distance_sq: f32,
    ) -> LodVisibility {
        if closest_distance_sq >= self.max_lod_distance_sq {
            LodVisibility::CulledByDistance
        } else if distance_to_frustum <= self.distance_to_frustum
            || (prev_visibility == LodVisibility::CanBeSeen
                && distance_to_frustum
                    <= self.distance_to_frustum + self.distance_to_frustum_hysteresis)
        {
            LodVisibility::CanBeSeen
        } else {
            LodVisibility::CulledByFrustum
        }
    }

    fn tiers(&self, is_visible: bool) -> &TierDistances {
        if is_visible { &self.visible } else { &self.base }
    }

    fn accumulate(
        &self,
        counts: &mut LodBucketCounts,
        lod: LodLevel,
        distance_sq: f32,
        is_visible: bool,
    ) {
        if lod == LodLevel::Off {
            return;
        }
        let tiers = self.tiers(is_visible);
        let tier = lod.index();
        let bucket = tiers.bucket_index(tier, tiers.distance[tier], distance_sq.sqrt());
        counts.add(lod, bucket, is_visible);
    }

    fn compute_significance(
        &self,
        lod: LodLevel,
        distance_sq: f32,
        is_visible: bool,
        data: &LodRuntimeData,
    ) -> f32 {
        if lod == LodLevel::Off {
            return LodLevel::Off.as_f32();
        }
        let tier = lod.index();
        let start = data.distances(is_visible)[tier];
        let bucket = self
            .tiers(is_visible)
            .bucket_index(tier, start, distance_sq.sqrt());
        lod.as_f32() + bucket as f32 / BUCKETS_PER_LOD as f32
    }
}
