//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use throng_lod::{LodDebugConfig, LodLevel, LodLogic, LodSettings, RepresentationLodMap};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// LOD feature flags, distances and budgets.
    pub lod: LodConfig,
    /// Simulation interval per LOD.
    pub tick_rate: TickRateConfig,
    /// Representation chosen per LOD.
    pub representation: RepresentationLodMap,
    /// Headless crowd simulation.
    pub simulation: SimulationConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// LOD configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Which optional LOD paths run.
    pub logic: LodLogic,
    /// Distances, hysteresis and budgets.
    pub settings: LodSettings,
}

/// Variable tick rate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TickRateConfig {
    /// Seconds between simulation ticks for High, Medium, Low and Off.
    pub tick_rates: [f32; LodLevel::COUNT],
    /// Stagger the first tick of each chunk.
    pub spread_first_update: bool,
}

/// Headless crowd simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of entities spawned.
    pub entity_count: u32,
    /// Entities per chunk.
    pub chunk_size: u32,
    /// Number of viewers orbiting the crowd.
    pub viewer_count: u32,
    /// Half extent of the square the crowd spawns in.
    pub world_extent: f32,
    /// Entity walking speed in units per second.
    pub walk_speed: f32,
    /// Frames to simulate.
    pub frames: u32,
    /// Seconds per frame.
    pub frame_dt: f32,
    /// RNG seed for spawning.
    pub seed: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// LOD debug toggles.
    pub lod: LodDebugConfig,
    /// Log a LOD summary every this many frames (0 disables).
    pub stats_interval_frames: u32,
}

// --- Default implementations ---

impl Default for TickRateConfig {
    fn default() -> Self {
        Self {
            tick_rates: [0.0, 0.1, 0.5, 1.0],
            spread_first_update: true,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            entity_count: 20_000,
            chunk_size: 128,
            viewer_count: 2,
            world_extent: 12_000.0,
            walk_speed: 150.0,
            frames: 300,
            frame_dt: 1.0 / 30.0,
            seed: 42,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            lod: LodDebugConfig::default(),
            stats_interval_frames: 60,
        }
    }
}

/// Platform config directory for Throng, falling back to the working directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("throng"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Check every section for values the runtime cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lod.settings.validate(&self.lod.logic)?;

        if !self
            .tick_rate
            .tick_rates
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0)
        {
            return Err(ConfigError::InvalidValue {
                field: "tick_rate.tick_rates",
                reason: format!("must be finite and non-negative: {:?}", self.tick_rate.tick_rates),
            });
        }
        if self.simulation.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "simulation.chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.simulation.viewer_count as usize > throng_lod::MAX_VIEWERS {
            return Err(ConfigError::InvalidValue {
                field: "simulation.viewer_count",
                reason: format!("at most {} viewers are supported", throng_lod::MAX_VIEWERS),
            });
        }
        if !(self.simulation.frame_dt.is_finite() && self.simulation.frame_dt > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "simulation.frame_dt",
                reason: format!("must be positive, got {}", self.simulation.frame_dt),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use throng_lod::{LodSettingsError, RepresentationKind, VisibilitySettings};

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(4))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("entity_count: 20000"));
        assert!(ron_str.contains("HighResSpawnedActor"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip_with_optional_groups() {
        let mut config = Config::default();
        config.lod.logic.do_visibility = true;
        config.lod.settings.visibility = Some(VisibilitySettings::default());
        config.lod.settings.lod_max_count = [100, 200, 400, u32::MAX];

        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let ron_str = "(lod: (settings: (lod_max_count: (10, 20, 30, 40))))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lod.settings.lod_max_count, [10, 20, 30, 40]);
        assert_eq!(
            config.lod.settings.base_lod_distance,
            LodSettings::default().base_lod_distance
        );
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_representation_override() {
        let ron_str = "(representation: (StaticMeshInstance, StaticMeshInstance, None, None))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(
            config.representation.representation(LodLevel::High),
            RepresentationKind::StaticMeshInstance
        );
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.simulation.entity_count = 500;
        config.lod.settings.lod_max_count = [10, 20, 30, u32::MAX];

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    /// Visibility enabled without its settings group is rejected on load.
    #[test]
    fn test_load_rejects_mismatched_lod_groups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.ron"),
            "(lod: (logic: (do_visibility: true)))",
        )
        .unwrap();

        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidLod(LodSettingsError::VisibilityMismatch)
        ));
    }

    #[test]
    fn test_invalid_simulation_values() {
        let mut config = Config::default();
        config.simulation.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "simulation.chunk_size",
                ..
            })
        ));

        let mut config = Config::default();
        config.simulation.viewer_count = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.lod.settings.buffer_hysteresis_on_distance_percentage = 20.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(
            result
                .unwrap()
                .lod
                .settings
                .buffer_hysteresis_on_distance_percentage,
            20.0
        );
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
