//! Headless crowd demo: spawns a seeded crowd, circles viewers around it and
//! runs the LOD processor every frame, ticking chunks at the rate their LOD
//! allows.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p throng-demo -- --entities 50000 --viewers 3`.

mod crowd;

use clap::Parser;
use throng_config::{CliArgs, Config, default_config_dir};
use throng_lod::{LodLevel, LodProcessor, LodStats, RepresentationKind, TickRateController};
use tracing::{error, info};

use crate::crowd::{Crowd, orbiting_viewers};

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    throng_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(2);
    }

    let mut processor = match LodProcessor::try_new(config.lod.logic, &config.lod.settings) {
        Ok(processor) => processor,
        Err(e) => {
            error!("Invalid LOD settings: {e}");
            std::process::exit(2);
        }
    };
    let controller = TickRateController::new(
        config.tick_rate.tick_rates,
        config.tick_rate.spread_first_update,
    );

    let sim = &config.simulation;
    let mut crowd = Crowd::spawn(sim);
    info!(
        entities = crowd.len(),
        chunks = crowd.chunk_count(),
        viewers = sim.viewer_count,
        seed = sim.seed,
        "Spawned crowd"
    );

    let mut last_stats = LodStats::default();
    let mut simulated_entities = 0usize;
    for frame in 0..sim.frames {
        let time = frame as f32 * sim.frame_dt;
        let viewers = orbiting_viewers(sim.viewer_count as usize, time, sim.world_extent);

        last_stats = {
            let mut chunks = crowd.lod_chunks();
            processor.execute(&viewers, &mut chunks, &config.debug.lod)
        };
        let ticked = crowd.tick(&controller, sim.frame_dt);
        simulated_entities += ticked.entities;

        let interval = config.debug.stats_interval_frames;
        if interval > 0 && frame % interval == 0 {
            log_frame(frame, &last_stats, &config, ticked.chunks);
        }
    }

    info!(
        frames = sim.frames,
        simulated_entities,
        high = last_stats.count(LodLevel::High),
        off = last_stats.count(LodLevel::Off),
        "Simulation finished"
    );
}

fn log_frame(frame: u32, stats: &LodStats, config: &Config, ticked_chunks: usize) {
    let map = &config.representation;
    let [high, medium, low, off] = stats.per_lod;
    info!(
        frame,
        high,
        medium,
        low,
        off,
        changed = stats.changed,
        ticked_chunks,
        actors = stats.representation_count(map, RepresentationKind::HighResSpawnedActor)
            + stats.representation_count(map, RepresentationKind::LowResSpawnedActor),
        instances = stats.representation_count(map, RepresentationKind::StaticMeshInstance),
        "LOD summary"
    );
}
