//! LOD systems and their ordering.
//!
//! Each phase of the LOD frame is its own system in its own [`LodSet`]; the
//! sets are chained so a phase only starts once every entity went through
//! the previous one.

use std::slice;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::Schedule;
use throng_lod::LodStats;
use tracing::trace;

use crate::components::{LodInfo, Position, Representation, ViewerInfo};
use crate::resources::{LodFrameStats, LodState, Representations, Viewers};

/// Phases of the LOD frame, run in declaration order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LodSet {
    /// Cache viewers and reset last frame's clamped distances.
    Prepare,
    /// Gather per-viewer distances and visibility.
    Collect,
    /// First classification pass and bucket counting.
    Calculate,
    /// Clamp thresholds against the count budgets.
    AdjustDistances,
    /// Reclassify against the clamped thresholds.
    AdjustLod,
    /// Systems reading the final LODs.
    Consume,
}

/// Add every LOD system to `schedule`, ordered by [`LodSet`].
pub fn register_lod_systems(schedule: &mut Schedule) {
    schedule.configure_sets(
        (
            LodSet::Prepare,
            LodSet::Collect,
            LodSet::Calculate,
            LodSet::AdjustDistances,
            LodSet::AdjustLod,
            LodSet::Consume,
        )
            .chain(),
    );
    schedule.add_systems((
        prepare_lod.in_set(LodSet::Prepare),
        collect_lod_info.in_set(LodSet::Collect),
        calculate_lod.in_set(LodSet::Calculate),
        adjust_distances_from_count.in_set(LodSet::AdjustDistances),
        adjust_lod_from_count.in_set(LodSet::AdjustLod),
        (update_representation, record_lod_stats).in_set(LodSet::Consume),
    ));
}

pub fn prepare_lod(viewers: Res<Viewers>, mut state: ResMut<LodState>) {
    if state.debug.force_off {
        return;
    }
    let state = &mut *state;
    state.collector.prepare_execution(&viewers.0);
    state.calculator.prepare_execution(&viewers.0);
}

pub fn collect_lod_info(state: Res<LodState>, mut query: Query<(&Position, &mut ViewerInfo)>) {
    if state.debug.force_off {
        return;
    }
    for (position, mut info) in &mut query {
        state
            .collector
            .collect_lod_info(slice::from_ref(&position.0), slice::from_mut(&mut info.0));
    }
}

/// First pass: every entity is classified and counted, then the counts are
/// folded into the calculator in one go.
pub fn calculate_lod(mut state: ResMut<LodState>, mut query: Query<(&ViewerInfo, &mut LodInfo)>) {
    let state = &mut *state;
    if state.debug.force_off {
        for (_, mut lod) in &mut query {
            state.calculator.force_off_lod(slice::from_mut(&mut lod.0));
        }
        return;
    }

    let mut counts = state.calculator.new_frame_counts();
    for (viewer_info, mut lod) in &mut query {
        state.calculator.classify(
            slice::from_ref(&viewer_info.0),
            slice::from_mut(&mut lod.0),
            &mut counts,
        );
    }
    state.calculator.merge_counts(&counts);
}

pub fn adjust_distances_from_count(mut state: ResMut<LodState>) {
    state.needs_adjustment = if state.debug.force_off {
        false
    } else {
        state.calculator.adjust_distances_from_count()
    };
}

pub fn adjust_lod_from_count(state: Res<LodState>, mut query: Query<(&ViewerInfo, &mut LodInfo)>) {
    if !state.needs_adjustment {
        return;
    }
    for (viewer_info, mut lod) in &mut query {
        state
            .calculator
            .adjust_lod_from_count(slice::from_ref(&viewer_info.0), slice::from_mut(&mut lod.0));
    }
}

/// Swap representations whose LOD mapping changed.
pub fn update_representation(
    representations: Res<Representations>,
    mut query: Query<(&LodInfo, &mut Representation)>,
) {
    for (lod, mut representation) in &mut query {
        representation.set_if_neq(Representation(representations.0.representation(lod.0.lod)));
    }
}

pub fn record_lod_stats(mut stats: ResMut<LodFrameStats>, query: Query<&LodInfo>) {
    let mut frame = LodStats::default();
    for lod in &query {
        frame.record(&lod.0);
    }
    let [high, medium, low, off] = frame.per_lod;
    trace!(entities = frame.entities, high, medium, low, off, "LOD frame");
    stats.0 = frame;
}
