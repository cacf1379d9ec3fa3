use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ProcessorError;
use crate::processing::Aggregation;

const ENV_PREFIX: &str = "FRAMEBENCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Sobel magnitude at or above which a pixel counts as an edge.
    pub edge_threshold: u8,
    /// Also time the path that was not selected when processing one image.
    pub measure_both_paths: bool,
    /// Accelerated path pool size, 0 lets rayon decide.
    pub worker_threads: usize,
    pub benchmark: BenchmarkConfiguration,
    pub bridge: BridgeConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfiguration {
    pub aggregation: Aggregation,
    pub warmup_iterations: u32,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfiguration {
    pub timeout_ms: Option<u64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            edge_threshold: 100,
            measure_both_paths: true,
            worker_threads: 0,
            benchmark: BenchmarkConfiguration::default(),
            bridge: BridgeConfiguration::default(),
        }
    }
}

impl Default for BenchmarkConfiguration {
    fn default() -> Self {
        Self {
            aggregation: Aggregation::Mean,
            warmup_iterations: 0,
            max_iterations: 10_000,
        }
    }
}

impl BridgeConfiguration {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Configuration {
    /// Layers defaults, then the optional file, then `FRAMEBENCH_*`
    /// environment variables. Nested keys use `__`, e.g.
    /// `FRAMEBENCH_BENCHMARK__AGGREGATION=median`.
    pub fn load(path: Option<&Path>) -> Result<Self, ProcessorError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ProcessorError::InvalidConfig(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let configuration: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        configuration.validate()?;
        Ok(configuration)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.benchmark.max_iterations == 0 {
            return Err(ProcessorError::InvalidConfig(
                "benchmark.max_iterations must be greater than 0".to_string(),
            ));
        }

        if self.bridge.timeout_ms == Some(0) {
            return Err(ProcessorError::InvalidConfig(
                "bridge.timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tempfile::TempDir;

    // Environment variables are process-wide; every test that loads
    // configuration holds this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn test_defaults_are_valid() {
        let configuration = Configuration::default();
        assert!(configuration.validate().is_ok());
        assert_eq!(configuration.edge_threshold, 100);
        assert_eq!(configuration.benchmark.aggregation, Aggregation::Mean);
        assert_eq!(configuration.bridge.timeout(), None);
    }

    #[test]
    fn test_load_toml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("framebench.toml");
        std::fs::write(
            &path,
            r#"
edge_threshold = 64
measure_both_paths = false

[benchmark]
aggregation = "median"
warmup_iterations = 2

[bridge]
timeout_ms = 1500
"#,
        )
        .unwrap();

        let _env = env_lock();
        let configuration = Configuration::load(Some(&path)).unwrap();
        assert_eq!(configuration.edge_threshold, 64);
        assert!(!configuration.measure_both_paths);
        assert_eq!(configuration.benchmark.aggregation, Aggregation::Median);
        assert_eq!(configuration.benchmark.warmup_iterations, 2);
        assert_eq!(configuration.benchmark.max_iterations, 10_000);
        assert_eq!(
            configuration.bridge.timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let _env = env_lock();
        assert!(matches!(
            Configuration::load(Some(&path)),
            Err(ProcessorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("framebench.toml");
        std::fs::write(&path, "[benchmark]\naggregation = \"last\"\n").unwrap();

        let _env = env_lock();
        std::env::set_var("FRAMEBENCH_BENCHMARK__AGGREGATION", "median");
        std::env::set_var("FRAMEBENCH_BRIDGE__TIMEOUT_MS", "250");
        let loaded = Configuration::load(Some(&path));
        std::env::remove_var("FRAMEBENCH_BENCHMARK__AGGREGATION");
        std::env::remove_var("FRAMEBENCH_BRIDGE__TIMEOUT_MS");

        let configuration = loaded.unwrap();
        assert_eq!(configuration.benchmark.aggregation, Aggregation::Median);
        assert_eq!(
            configuration.bridge.timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(configuration.edge_threshold, 100);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut configuration = Configuration::default();
        configuration.benchmark.max_iterations = 0;
        assert!(configuration.validate().is_err());

        let mut configuration = Configuration::default();
        configuration.bridge.timeout_ms = Some(0);
        assert!(configuration.validate().is_err());
    }
}
