use crate::utils::get_config_dir;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "UPLOADFLOW";

/// Settings of the upload orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Start uploads as soon as they are submitted
    pub auto_start: bool,
    /// Delay before a retried upload starts working again
    pub restart_delay_ms: u64,
    pub simulation: SimulationConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        UploaderConfig {
            auto_start: true,
            restart_delay_ms: 100,
            simulation: SimulationConfig::default(),
        }
    }
}

impl UploaderConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Behaviour of the simulated gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Latency range of destination requests
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Latency range of confirmations
    pub confirm_min_delay_ms: u64,
    pub confirm_max_delay_ms: u64,
    /// Pause between two progress reports of a transfer
    pub progress_min_interval_ms: u64,
    pub progress_max_interval_ms: u64,
    /// Fail the first destination request of every file name
    pub fail_first_attempt: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            min_delay_ms: 300,
            max_delay_ms: 800,
            confirm_min_delay_ms: 200,
            confirm_max_delay_ms: 500,
            progress_min_interval_ms: 100,
            progress_max_interval_ms: 300,
            fail_first_attempt: true,
        }
    }
}

impl SimulationConfig {
    /// No latency and no injected failures
    pub fn instant() -> Self {
        SimulationConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            confirm_min_delay_ms: 0,
            confirm_max_delay_ms: 0,
            progress_min_interval_ms: 0,
            progress_max_interval_ms: 0,
            fail_first_attempt: false,
        }
    }
}

/// Load the configuration.
///
/// Built-in defaults are overridden by `config_file` (or `config.toml` in the
/// config directory when absent), which is in turn overridden by
/// `UPLOADFLOW__*` environment variables, e.g. `UPLOADFLOW__AUTO_START=false`
/// or `UPLOADFLOW__SIMULATION__FAIL_FIRST_ATTEMPT=false`.
pub fn load_config(config_file: Option<PathBuf>) -> eyre::Result<UploaderConfig> {
    let (path, required) = match config_file {
        Some(path) => (path, true),
        None => (get_config_dir().join(CONFIG_FILE), false),
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(required))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let config: UploaderConfig = settings.try_deserialize()?;
    tracing::debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::default();
        assert!(config.auto_start);
        assert_eq!(config.restart_delay(), Duration::from_millis(100));
        assert!(config.simulation.fail_first_attempt);
        assert_eq!(config.simulation.min_delay_ms, 300);
        assert_eq!(config.simulation.max_delay_ms, 800);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "auto_start = false\n\n[simulation]\nfail_first_attempt = false\nmax_delay_ms = 10\n",
        )
        .unwrap();

        let config = load_config(Some(path)).unwrap();
        assert!(!config.auto_start);
        assert_eq!(config.restart_delay_ms, 100);
        assert!(!config.simulation.fail_first_attempt);
        assert_eq!(config.simulation.max_delay_ms, 10);
        assert_eq!(config.simulation.min_delay_ms, 300);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "auto_start = \"sometimes\"").unwrap();
        assert!(load_config(Some(path)).is_err());
    }
}
