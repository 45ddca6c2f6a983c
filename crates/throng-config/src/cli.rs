//! Command-line argument parsing for Throng.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Throng crowd simulation command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "throng", about = "Headless crowd LOD simulation")]
pub struct CliArgs {
    /// Number of entities to spawn.
    #[arg(long)]
    pub entities: Option<u32>,

    /// Entities per chunk.
    #[arg(long)]
    pub chunk_size: Option<u32>,

    /// Number of viewers.
    #[arg(long)]
    pub viewers: Option<u32>,

    /// Frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// RNG seed for spawning.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Force every entity to the Off LOD.
    #[arg(long)]
    pub force_off: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(n) = args.entities {
            self.simulation.entity_count = n;
        }
        if let Some(size) = args.chunk_size {
            self.simulation.chunk_size = size;
        }
        if let Some(n) = args.viewers {
            self.simulation.viewer_count = n;
        }
        if let Some(frames) = args.frames {
            self.simulation.frames = frames;
        }
        if let Some(seed) = args.seed {
            self.simulation.seed = seed;
        }
        if let Some(off) = args.force_off {
            self.debug.lod.force_off = off;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            entities: Some(1000),
            seed: Some(7),
            force_off: Some(true),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.simulation.entity_count, 1000);
        assert_eq!(config.simulation.seed, 7);
        assert!(config.debug.lod.force_off);
        // Non-overridden fields retain defaults
        assert_eq!(config.simulation.chunk_size, 128);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parse() {
        let args = CliArgs::parse_from(["throng", "--entities", "64", "--viewers", "3"]);
        assert_eq!(args.entities, Some(64));
        assert_eq!(args.viewers, Some(3));
        assert!(args.config.is_none());
    }
}
