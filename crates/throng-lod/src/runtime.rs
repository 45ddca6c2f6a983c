//! Per-frame bucket histograms and the count-driven threshold clamping.

use crate::lod::{BUCKETS_PER_LOD, LodLevel, MAX_VIEWERS};

/// Tiers that are split into buckets. `Off` is a single catch-all.
const BUCKETED_TIERS: usize = LodLevel::COUNT - 1;

/// Configured tier distances and the width of one bucket in each tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TierDistances {
    pub distance: [f32; LodLevel::COUNT],
    pub bucket_size: [f32; LodLevel::COUNT],
}

impl TierDistances {
    /// Forces the `High` distance to zero.
    pub fn new(mut distance: [f32; LodLevel::COUNT]) -> Self {
        distance[LodLevel::High.index()] = 0.0;
        let mut bucket_size = [f32::MAX; LodLevel::COUNT];
        for tier in 0..BUCKETED_TIERS {
            bucket_size[tier] = (distance[tier + 1] - distance[tier]) / BUCKETS_PER_LOD as f32;
        }
        Self {
            distance,
            bucket_size,
        }
    }

    /// Start distance of `bucket` within `tier`; one past the last bucket is
    /// the start of the next tier.
    pub fn bucket_start(&self, tier: usize, bucket: usize) -> f32 {
        if bucket >= BUCKETS_PER_LOD {
            self.distance[tier + 1]
        } else {
            self.distance[tier] + bucket as f32 * self.bucket_size[tier]
        }
    }

    /// Bucket holding `distance` within `tier`, measured from `tier_start`.
    pub fn bucket_index(&self, tier: usize, tier_start: f32, distance: f32) -> usize {
        let size = self.bucket_size[tier];
        if size <= 0.0 {
            return 0;
        }
        // Sqrt is not precise enough near the edges, hence the clamp.
        let bucket = ((distance - tier_start) / size) as i64;
        bucket.clamp(0, BUCKETS_PER_LOD as i64 - 1) as usize
    }
}

/// Entity counts per distance bucket, split into visible and not-visible
/// populations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LodBucketCounts {
    visible: Vec<u32>,
    base: Vec<u32>,
}

impl LodBucketCounts {
    /// Zeroed counts for every bucketed tier.
    pub fn new() -> Self {
        Self {
            visible: vec![0; BUCKETED_TIERS * BUCKETS_PER_LOD],
            base: vec![0; BUCKETED_TIERS * BUCKETS_PER_LOD],
        }
    }

    /// Zero every bucket, allocating on first use.
    pub fn reset(&mut self) {
        if self.base.is_empty() {
            *self = Self::new();
        } else {
            self.visible.fill(0);
            self.base.fill(0);
        }
    }

    /// Count one entity. `Off` entities are not bucketed.
    pub fn add(&mut self, lod: LodLevel, bucket: usize, is_visible: bool) {
        if lod == LodLevel::Off {
            return;
        }
        let index = lod.index() * BUCKETS_PER_LOD + bucket;
        if is_visible {
            self.visible[index] += 1;
        } else {
            self.base[index] += 1;
        }
    }

    /// Visible entities in a bucket.
    pub fn visible(&self, lod: LodLevel, bucket: usize) -> u32 {
        self.visible
            .get(lod.index() * BUCKETS_PER_LOD + bucket)
            .copied()
            .unwrap_or(0)
    }

    /// Not-visible entities in a bucket.
    pub fn base(&self, lod: LodLevel, bucket: usize) -> u32 {
        self.base
            .get(lod.index() * BUCKETS_PER_LOD + bucket)
            .copied()
            .unwrap_or(0)
    }

    /// Add another histogram into this one.
    pub fn merge(&mut self, other: &LodBucketCounts) {
        if other.base.is_empty() {
            return;
        }
        if self.base.is_empty() {
            self.reset();
        }
        for (dst, src) in self.visible.iter_mut().zip(&other.visible) {
            *dst += src;
        }
        for (dst, src) in self.base.iter_mut().zip(&other.base) {
            *dst += src;
        }
    }

    /// Entities counted in `lod`.
    pub fn tier_total(&self, lod: LodLevel) -> u64 {
        (0..BUCKETS_PER_LOD)
            .map(|bucket| u64::from(self.visible(lod, bucket)) + u64::from(self.base(lod, bucket)))
            .sum()
    }

    /// Entities counted in every bucket.
    pub fn total(&self) -> u64 {
        self.visible
            .iter()
            .chain(&self.base)
            .map(|&c| u64::from(c))
            .sum()
    }
}

/// Partial counts produced by one chunk, merged after a parallel sweep.
#[derive(Clone, Debug, Default)]
pub struct FrameCounts {
    /// Counts against the aggregate (closest viewer) classification.
    pub aggregate: LodBucketCounts,
    /// Counts for each viewer slot; empty unless maximizing per viewer.
    pub per_viewer: Vec<LodBucketCounts>,
}

impl FrameCounts {
    /// Zeroed counts, with per-viewer histograms when `per_viewer` is set.
    pub fn new(per_viewer: bool) -> Self {
        let per_viewer = if per_viewer {
            vec![LodBucketCounts::new(); MAX_VIEWERS]
        } else {
            Vec::new()
        };
        Self {
            aggregate: LodBucketCounts::new(),
            per_viewer,
        }
    }

    /// Zero the counts, sizing the per-viewer histograms as requested.
    pub fn reset(&mut self, per_viewer: bool) {
        self.aggregate.reset();
        if per_viewer {
            self.per_viewer.resize_with(MAX_VIEWERS, LodBucketCounts::new);
            self.per_viewer.iter_mut().for_each(LodBucketCounts::reset);
        } else {
            self.per_viewer.clear();
        }
    }

    /// Add another chunk's counts into these.
    pub fn merge(&mut self, other: &FrameCounts) {
        self.aggregate.merge(&other.aggregate);
        if self.per_viewer.len() < other.per_viewer.len() {
            self.per_viewer
                .resize_with(other.per_viewer.len(), LodBucketCounts::new);
        }
        for (dst, src) in self.per_viewer.iter_mut().zip(&other.per_viewer) {
            dst.merge(src);
        }
    }
}

/// Bucket counts plus the adjusted thresholds of one frame.
#[derive(Clone, Debug)]
pub struct LodRuntimeData {
    pub counts: LodBucketCounts,
    adjusted_base_distance: [f32; LodLevel::COUNT],
    adjusted_base_distance_sq: [f32; LodLevel::COUNT],
    adjusted_visible_distance: [f32; LodLevel::COUNT],
    adjusted_visible_distance_sq: [f32; LodLevel::COUNT],
}

impl LodRuntimeData {
    pub(crate) fn new(base: &TierDistances, visible: &TierDistances) -> Self {
        let mut data = Self {
            counts: LodBucketCounts::new(),
            adjusted_base_distance: [0.0; LodLevel::COUNT],
            adjusted_base_distance_sq: [0.0; LodLevel::COUNT],
            adjusted_visible_distance: [0.0; LodLevel::COUNT],
            adjusted_visible_distance_sq: [0.0; LodLevel::COUNT],
        };
        data.reset(base, visible);
        data
    }

    /// Zero the counts and restore the configured thresholds.
    pub(crate) fn reset(&mut self, base: &TierDistances, visible: &TierDistances) {
        self.counts.reset();
        self.adjusted_base_distance = base.distance;
        self.adjusted_base_distance_sq = base.distance.map(|d| d * d);
        self.adjusted_visible_distance = visible.distance;
        self.adjusted_visible_distance_sq = visible.distance.map(|d| d * d);
    }

    /// Adjusted tier distances for the visible or the base population.
    pub fn distances(&self, is_visible: bool) -> &[f32; LodLevel::COUNT] {
        if is_visible {
            &self.adjusted_visible_distance
        } else {
            &self.adjusted_base_distance
        }
    }

    /// Squared counterpart of [`Self::distances`].
    pub fn distances_sq(&self, is_visible: bool) -> &[f32; LodLevel::COUNT] {
        if is_visible {
            &self.adjusted_visible_distance_sq
        } else {
            &self.adjusted_base_distance_sq
        }
    }

    /// Pull a tier's start in; never pushes it out.
    fn tighten(&mut self, tier: usize, base_distance: f32, visible_distance: f32) {
        let base = base_distance.min(self.adjusted_base_distance[tier]);
        self.adjusted_base_distance[tier] = base;
        self.adjusted_base_distance_sq[tier] = base * base;

        let visible = visible_distance.min(self.adjusted_visible_distance[tier]);
        self.adjusted_visible_distance[tier] = visible;
        self.adjusted_visible_distance_sq[tier] = visible * visible;
    }

    /// Advance past every tier whose budget `count` exceeds, anchoring each at
    /// the given distances. Returns `true` once `Off` is reached.
    fn push_tiers(
        &mut self,
        processing: &mut usize,
        count: u64,
        max_count: &[u32; LodLevel::COUNT],
        base_anchor: f32,
        visible_anchor: f32,
    ) -> bool {
        loop {
            *processing += 1;
            self.tighten(*processing, base_anchor, visible_anchor);
            if *processing == LodLevel::Off.index() {
                return true;
            }
            if count <= u64::from(max_count[*processing]) {
                return false;
            }
        }
    }

    /// Tighten tier thresholds so no tier holds more than its budget.
    ///
    /// Walks the buckets from closest to farthest, counting visible entities
    /// before not-visible ones at each bucket. When a bucket overflows the
    /// tier being filled, the bucket (or its not-visible part) moves to the
    /// next tier, whose start is anchored at that bucket. Returns `true` if
    /// any threshold moved.
    pub(crate) fn adjust_distances_from_count(
        &mut self,
        max_count: &[u32; LodLevel::COUNT],
        base: &TierDistances,
        visible: &TierDistances,
    ) -> bool {
        let mut adjusted = false;
        let mut processing = LodLevel::High.index();
        let mut count: u64 = 0;

        for tier in 0..BUCKETED_TIERS {
            if processing < tier {
                processing = tier;
                count = 0;
            }
            let lod = LodLevel::from_index(tier);

            for bucket in 0..BUCKETS_PER_LOD {
                let visible_count = u64::from(self.counts.visible(lod, bucket));
                let base_count = u64::from(self.counts.base(lod, bucket));

                count += visible_count;
                if count > u64::from(max_count[processing]) {
                    adjusted = true;
                    count = visible_count + base_count;
                    if self.push_tiers(
                        &mut processing,
                        count,
                        max_count,
                        base.bucket_start(tier, bucket),
                        visible.bucket_start(tier, bucket),
                    ) {
                        return true;
                    }
                    continue;
                }

                count += base_count;
                if count > u64::from(max_count[processing]) {
                    // Visible entities of this bucket keep their tier.
                    adjusted = true;
                    count = base_count;
                    if self.push_tiers(
                        &mut processing,
                        count,
                        max_count,
                        base.bucket_start(tier, bucket),
                        visible.bucket_start(tier, bucket + 1),
                    ) {
                        return true;
                    }
                }
            }
        }
        adjusted
    }
}
