//! Variable simulation tick rate per chunk, driven by LOD.

use crate::info::EntityLodInfo;
use crate::lod::LodLevel;

/// Fraction of the golden ratio used to spread first updates.
const SPREAD_STEP: f64 = 0.618_033_988_749_895;

/// Per-chunk tick bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkTickState {
    /// LOD the chunk ticks at, refreshed on every tick.
    pub lod: LodLevel,
    /// Seconds until the chunk ticks again.
    pub time_until_next_tick: f32,
    /// Time elapsed since the previous tick, valid when `should_tick` is set.
    pub tick_delta_time: f32,
    /// Whether the chunk ticks this frame.
    pub should_tick: bool,
    spread_key: u64,
    accumulated_time: f32,
    initialized: bool,
}

impl ChunkTickState {
    /// New state; `spread_key` staggers the first update of different chunks.
    pub fn new(spread_key: u64) -> Self {
        Self {
            lod: LodLevel::Off,
            time_until_next_tick: 0.0,
            tick_delta_time: 0.0,
            should_tick: false,
            spread_key,
            accumulated_time: 0.0,
            initialized: false,
        }
    }
}

/// Maps a chunk's LOD to how often it is simulated.
#[derive(Clone, Debug)]
pub struct TickRateController {
    tick_rates: [f32; LodLevel::COUNT],
    spread_first_update: bool,
}

impl TickRateController {
    /// `tick_rates[lod]` is the interval in seconds between ticks; zero ticks
    /// every frame.
    ///
    /// # Panics
    ///
    /// Panics if a rate is negative or not finite.
    pub fn new(tick_rates: [f32; LodLevel::COUNT], spread_first_update: bool) -> Self {
        assert!(
            tick_rates.iter().all(|r| r.is_finite() && *r >= 0.0),
            "tick rates must be finite and non-negative: {tick_rates:?}"
        );
        Self {
            tick_rates,
            spread_first_update,
        }
    }

    /// Tick interval for a LOD.
    pub fn tick_rate(&self, lod: LodLevel) -> f32 {
        self.tick_rates[lod.index()]
    }

    /// Advance a chunk by `delta_time` and decide whether it ticks.
    ///
    /// The chunk ticks at the finest LOD among its entities. On ticking, the
    /// interval restarts from the rate of that LOD and `tick_delta_time`
    /// holds the time elapsed since the previous tick.
    pub fn update_tick_rate_from_lod(
        &self,
        state: &mut ChunkTickState,
        lods: &[EntityLodInfo],
        delta_time: f32,
    ) -> bool {
        state.accumulated_time += delta_time;

        if state.initialized {
            state.time_until_next_tick -= delta_time;
        } else {
            state.initialized = true;
            state.lod = chunk_lod(lods);
            state.time_until_next_tick = if self.spread_first_update {
                self.tick_rate(state.lod) * spread_fraction(state.spread_key)
            } else {
                0.0
            };
        }

        state.should_tick = state.time_until_next_tick <= 0.0;
        if state.should_tick {
            state.lod = chunk_lod(lods);
            state.time_until_next_tick = self.tick_rate(state.lod);
            state.tick_delta_time = state.accumulated_time;
            state.accumulated_time = 0.0;
        }
        state.should_tick
    }
}

/// Finest LOD in the chunk; an empty chunk is `Off`.
fn chunk_lod(lods: &[EntityLodInfo]) -> LodLevel {
    lods.iter()
        .map(|info| info.lod)
        .min()
        .unwrap_or(LodLevel::Off)
}

fn spread_fraction(key: u64) -> f32 {
    ((key as f64 * SPREAD_STEP).fract()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(lod: LodLevel, len: usize) -> Vec<EntityLodInfo> {
        vec![
            EntityLodInfo {
                lod,
                ..Default::default()
            };
            len
        ]
    }

    fn controller() -> TickRateController {
        TickRateController::new([0.0, 0.25, 0.5, 1.0], false)
    }

    #[test]
    fn test_high_lod_ticks_every_frame() {
        let controller = controller();
        let lods = chunk(LodLevel::High, 4);
        let mut state = ChunkTickState::new(0);
        for _ in 0..5 {
            assert!(controller.update_tick_rate_from_lod(&mut state, &lods, 0.125));
            assert_eq!(state.tick_delta_time, 0.125);
        }
    }

    /// A Low chunk ticks every 0.5 s and reports the elapsed time.
    #[test]
    fn test_low_lod_ticks_at_interval() {
        let controller = controller();
        let lods = chunk(LodLevel::Low, 2);
        let mut state = ChunkTickState::new(0);

        let ticks: Vec<bool> = (0..9)
            .map(|_| controller.update_tick_rate_from_lod(&mut state, &lods, 0.125))
            .collect();
        assert_eq!(
            ticks,
            vec![true, false, false, false, true, false, false, false, true]
        );
        assert_eq!(state.tick_delta_time, 0.5);
    }

    /// The finest entity decides the chunk rate.
    #[test]
    fn test_chunk_uses_finest_lod() {
        let controller = controller();
        let mut lods = chunk(LodLevel::Off, 3);
        lods[1].lod = LodLevel::Medium;
        let mut state = ChunkTickState::new(0);
        controller.update_tick_rate_from_lod(&mut state, &lods, 0.1);
        assert_eq!(state.lod, LodLevel::Medium);
        assert_eq!(state.time_until_next_tick, 0.25);
    }

    #[test]
    fn test_empty_chunk_is_off() {
        let controller = controller();
        let mut state = ChunkTickState::new(0);
        controller.update_tick_rate_from_lod(&mut state, &[], 0.1);
        assert_eq!(state.lod, LodLevel::Off);
    }

    /// Spreading staggers the first tick of different chunks.
    #[test]
    fn test_spread_first_update() {
        let controller = TickRateController::new([1.0; LodLevel::COUNT], true);
        let lods = chunk(LodLevel::High, 1);

        let waits: Vec<f32> = (1..5)
            .map(|key| {
                let mut state = ChunkTickState::new(key);
                controller.update_tick_rate_from_lod(&mut state, &lods, 0.0);
                state.time_until_next_tick
            })
            .collect();
        for wait in &waits {
            assert!((0.0..1.0).contains(wait));
        }
        for pair in waits.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    #[should_panic(expected = "tick rates")]
    fn test_negative_rate_panics() {
        TickRateController::new([0.0, -1.0, 0.0, 0.0], false);
    }
}
