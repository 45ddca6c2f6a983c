//! Structured logging for Throng.
//!
//! Console output goes through the `tracing` fmt layer with uptime stamps and
//! module targets. Debug runs can also mirror every event as JSON lines into
//! a log file, which is how per-frame LOD counts are inspected after a run.

use std::fs::File;
use std::path::Path;

use throng_config::Config;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names one.
const DEFAULT_FILTER: &str = "info,throng_lod=info";

/// Name of the JSON log written under the log directory.
pub const LOG_FILE_NAME: &str = "throng.log";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the config's `debug.log_level`, which wins over the
/// built-in default. When `debug_build` is set and `log_dir` can be created,
/// events are also written as JSON to [`LOG_FILE_NAME`].
///
/// # Examples
///
/// ```no_run
/// use throng_config::Config;
/// use throng_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // rayon workers are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = File::create(log_dir.join(LOG_FILE_NAME))
    {
        subscriber.with(json_file_layer(log_file)).init();
        return;
    }

    subscriber.init();
}

/// Filter string taken from the config, or the default when it names none.
pub fn filter_directives(config: Option<&Config>) -> String {
    config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// JSON lines layer writing into `log_file`.
fn json_file_layer<S>(log_file: File) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter_str = format!("{}", default_env_filter());
        assert!(filter_str.contains("throng_lod=info"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_filter_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "debug,throng_lod=trace".to_string();
        assert_eq!(filter_directives(Some(&config)), "debug,throng_lod=trace");
    }

    #[test]
    fn test_empty_config_level_uses_default() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directives(Some(&config)), DEFAULT_FILTER);
        assert_eq!(filter_directives(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,throng_lod=trace",
            "warn,throng_lod=debug,throng_ecs=trace",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    /// Structured fields land in the JSON file as typed values.
    #[test]
    fn test_json_file_layer_writes_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join(LOG_FILE_NAME);
        let log_file = File::create(&log_path).unwrap();

        let subscriber = tracing_subscriber::registry().with(json_file_layer(log_file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(entities = 3, high = 1, "LOD frame");
        });

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let line = contents.lines().next().unwrap();
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["fields"]["message"], "LOD frame");
        assert_eq!(event["fields"]["entities"], 3);
        assert_eq!(event["fields"]["high"], 1);
    }
}
