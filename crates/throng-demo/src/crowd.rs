//! Headless crowd: entities wandering a square, split into fixed-size chunks
//! that tick at the rate their LOD allows.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use throng_config::SimulationConfig;
use throng_lod::{
    ChunkTickState, EntityLodInfo, EntityViewerInfo, LodChunk, TickRateController, Viewer,
    ViewerHandle,
};

/// How much of the crowd was simulated in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub chunks: usize,
    pub entities: usize,
}

pub struct Crowd {
    locations: Vec<Vec3>,
    headings: Vec<Vec3>,
    viewer_info: Vec<EntityViewerInfo>,
    lod: Vec<EntityLodInfo>,
    tick_states: Vec<ChunkTickState>,
    chunk_size: usize,
    extent: f32,
    walk_speed: f32,
}

impl Crowd {
    /// Scatter `entity_count` entities uniformly over the square, each with
    /// a random walking direction. The same seed always gives the same crowd.
    pub fn spawn(sim: &SimulationConfig) -> Self {
        let mut rng = Xoshiro256StarStar::seed_from_u64(sim.seed);
        let count = sim.entity_count as usize;
        let extent = sim.world_extent.max(1.0);

        let mut locations = Vec::with_capacity(count);
        let mut headings = Vec::with_capacity(count);
        for _ in 0..count {
            locations.push(Vec3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                0.0,
            ));
            let angle = rng.gen_range(0.0..TAU);
            headings.push(Vec3::new(angle.cos(), angle.sin(), 0.0));
        }

        let chunk_size = (sim.chunk_size as usize).max(1);
        let chunk_count = count.div_ceil(chunk_size);
        Self {
            locations,
            headings,
            viewer_info: vec![EntityViewerInfo::default(); count],
            lod: vec![EntityLodInfo::default(); count],
            tick_states: (0..chunk_count as u64).map(ChunkTickState::new).collect(),
            chunk_size,
            extent,
            walk_speed: sim.walk_speed,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.tick_states.len()
    }

    /// Borrow the crowd as LOD chunks for one processor frame.
    pub fn lod_chunks(&mut self) -> Vec<LodChunk<'_>> {
        let size = self.chunk_size;
        self.locations
            .chunks(size)
            .zip(self.viewer_info.chunks_mut(size))
            .zip(self.lod.chunks_mut(size))
            .map(|((locations, viewer_info), lod)| LodChunk::new(locations, viewer_info, lod))
            .collect()
    }

    /// Advance every chunk's tick clock and walk the ones that tick by the
    /// time elapsed since their previous tick.
    pub fn tick(&mut self, controller: &TickRateController, delta_time: f32) -> TickSummary {
        let size = self.chunk_size;
        let mut summary = TickSummary::default();

        for (index, state) in self.tick_states.iter_mut().enumerate() {
            let start = index * size;
            let end = (start + size).min(self.locations.len());
            if !controller.update_tick_rate_from_lod(state, &self.lod[start..end], delta_time) {
                continue;
            }

            summary.chunks += 1;
            summary.entities += end - start;
            let step = self.walk_speed * state.tick_delta_time;
            for (location, heading) in self.locations[start..end]
                .iter_mut()
                .zip(&mut self.headings[start..end])
            {
                *location += *heading * step;
                // Bounce off the edges of the square.
                if location.x.abs() > self.extent {
                    heading.x = -heading.x;
                    location.x = location.x.clamp(-self.extent, self.extent);
                }
                if location.y.abs() > self.extent {
                    heading.y = -heading.y;
                    location.y = location.y.clamp(-self.extent, self.extent);
                }
            }
        }
        summary
    }

    pub fn locations(&self) -> &[Vec3] {
        &self.locations
    }
}

/// Viewers circling the centre of the square at half its extent, each
/// looking along its direction of travel.
pub fn orbiting_viewers(count: usize, time: f32, extent: f32) -> Vec<Viewer> {
    let radius = extent * 0.5;
    (0..count)
        .map(|i| {
            let angle = time * 0.1 + i as f32 * TAU / count as f32;
            let location = Vec3::new(angle.cos() * radius, angle.sin() * radius, 170.0);
            let direction = Vec3::new(-angle.sin(), angle.cos(), 0.0);
            Viewer::new(ViewerHandle::new(i as u32, i as u32 + 1), location, direction)
        })
        .collect()
}
