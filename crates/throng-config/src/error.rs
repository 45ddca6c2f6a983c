//! Configuration error types.

use throng_lod::LodSettingsError;

/// Errors that can occur when loading, saving, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// LOD settings do not match the enabled LOD features.
    #[error("invalid LOD settings: {0}")]
    InvalidLod(#[from] LodSettingsError),

    /// A simulation or tick-rate value is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
