//! Configuration for Throng.
//!
//! Settings persist to disk as RON, accept CLI overrides via clap, and are
//! validated against the LOD feature flags before use.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LodConfig, SimulationConfig, TickRateConfig, default_config_dir,
};
pub use error::ConfigError;
