//! Configuration for the CLI
//!
//! Values come from an optional TOML file and `WRA_*` environment variables,
//! e.g. `WRA_RATES__CPU_CORE_HOUR=0.04` or `WRA_CACHE__ENABLED=false`.

use advisor_lib::{
    CacheLayer, CacheTtls, MemoryCacheStore, OrchestratorConfig, RateTable, SizingConfig,
};
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Top-level advisor configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub rates: RateTable,
    pub sizing: SizingConfig,
    pub cache: CacheSettings,
    pub orchestrator: OrchestratorSettings,
}

/// Cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// TTL for usage series in seconds
    #[serde(default = "default_usage_metrics_secs")]
    pub usage_metrics_secs: u64,

    /// TTL for autoscaler recommendations in seconds
    #[serde(default = "default_autoscaler_secs")]
    pub autoscaler_secs: u64,

    /// TTL for requests, pod counts and listings in seconds
    #[serde(default = "default_topology_secs")]
    pub topology_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_usage_metrics_secs() -> u64 {
    advisor_lib::cache::USAGE_METRICS_TTL.as_secs()
}

fn default_autoscaler_secs() -> u64 {
    advisor_lib::cache::AUTOSCALER_TTL.as_secs()
}

fn default_topology_secs() -> u64 {
    advisor_lib::cache::TOPOLOGY_TTL.as_secs()
}

fn default_max_entries() -> usize {
    advisor_lib::cache::DEFAULT_MAX_ENTRIES
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            usage_metrics_secs: default_usage_metrics_secs(),
            autoscaler_secs: default_autoscaler_secs(),
            topology_secs: default_topology_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheSettings {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            usage_metrics: Duration::from_secs(self.usage_metrics_secs),
            autoscaler_recommendations: Duration::from_secs(self.autoscaler_secs),
            topology: Duration::from_secs(self.topology_secs),
        }
    }

    /// In-memory cache layer, or a disabled one when caching is off
    pub fn layer(&self) -> CacheLayer {
        if !self.enabled {
            return CacheLayer::disabled();
        }
        let store = MemoryCacheStore::with_capacity(self.max_entries);
        CacheLayer::new(Arc::new(store), self.ttls())
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    /// Limit for each upstream read in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Limit for a whole batch in seconds; unset waits for every workload
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,

    #[serde(default = "default_max_concurrent_workloads")]
    pub max_concurrent_workloads: usize,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    #[serde(default = "default_replica_window_hours")]
    pub replica_window_hours: u32,

    #[serde(default = "default_min_distinct_pods")]
    pub min_distinct_pods: usize,
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent_workloads() -> usize {
    8
}

fn default_max_concurrent_calls() -> usize {
    16
}

fn default_replica_window_hours() -> u32 {
    1
}

fn default_min_distinct_pods() -> usize {
    3
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            batch_timeout_secs: None,
            max_concurrent_workloads: default_max_concurrent_workloads(),
            max_concurrent_calls: default_max_concurrent_calls(),
            replica_window_hours: default_replica_window_hours(),
            min_distinct_pods: default_min_distinct_pods(),
        }
    }
}

impl OrchestratorSettings {
    pub fn to_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            batch_timeout: self.batch_timeout_secs.map(Duration::from_secs),
            max_concurrent_workloads: self.max_concurrent_workloads,
            max_concurrent_calls: self.max_concurrent_calls,
            replica_window_hours: self.replica_window_hours,
            min_distinct_pods: self.min_distinct_pods,
        }
    }
}

impl AdvisorConfig {
    /// Load from `explicit` (must exist) or the default path (optional), then the environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => {
                let path = default_config_path()?;
                config::File::from(path).required(false)
            }
        };

        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix("WRA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}

/// `~/.config/wra/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("wra").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};
    use std::io::Write;

    fn from_toml(toml: &str) -> Result<AdvisorConfig> {
        AdvisorConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg.rates, RateTable::default());
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttls(), CacheTtls::default());

        let orch = cfg.orchestrator.to_config();
        let defaults = OrchestratorConfig::default();
        assert_eq!(orch.call_timeout, defaults.call_timeout);
        assert_eq!(orch.batch_timeout, None);
        assert_eq!(orch.max_concurrent_workloads, defaults.max_concurrent_workloads);
        assert_eq!(orch.max_concurrent_calls, defaults.max_concurrent_calls);
        assert_eq!(orch.min_distinct_pods, defaults.min_distinct_pods);
    }

    #[test]
    fn test_cache_defaults_follow_engine_ttls() {
        use advisor_lib::cache::{AUTOSCALER_TTL, TOPOLOGY_TTL, USAGE_METRICS_TTL};

        let cache = CacheSettings::default();
        assert_eq!(cache.usage_metrics_secs, USAGE_METRICS_TTL.as_secs());
        assert_eq!(cache.autoscaler_secs, AUTOSCALER_TTL.as_secs());
        assert_eq!(cache.topology_secs, TOPOLOGY_TTL.as_secs());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = from_toml(
            r#"
            [rates]
            cpu_core_hour = 0.05
            currency = "EUR"

            [cache]
            usage_metrics_secs = 60

            [orchestrator]
            call_timeout_ms = 250
            batch_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(cfg.rates.cpu_core_hour, 0.05);
        assert_eq!(cfg.rates.currency, "EUR");
        assert_eq!(cfg.rates.currency_decimals, 2);

        let ttls = cfg.cache.ttls();
        assert_eq!(ttls.usage_metrics, Duration::from_secs(60));
        assert_eq!(ttls.topology, Duration::from_secs(3600));

        let orch = cfg.orchestrator.to_config();
        assert_eq!(orch.call_timeout, Duration::from_millis(250));
        assert_eq!(orch.batch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(orch.max_concurrent_calls, 16);
    }

    #[test]
    fn test_disabled_cache_layer() {
        let cfg = from_toml("[cache]\nenabled = false\n").unwrap();
        assert!(!cfg.cache.layer().is_enabled());
        assert!(CacheSettings::default().layer().is_enabled());
    }

    #[test]
    fn test_sizing_section() {
        let cfg = from_toml("[sizing]\ncpu_buffer = 1.0\n").unwrap();
        assert_eq!(cfg.sizing.cpu_buffer, 1.0);
        assert_eq!(cfg.sizing.memory_buffer, SizingConfig::default().memory_buffer);
    }

    #[test]
    fn test_rejects_wrong_type() {
        assert!(from_toml("[cache]\nmax_entries = \"lots\"\n").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[rates]\nmemory_gib_hour = 0.01").unwrap();

        let cfg = AdvisorConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.rates.memory_gib_hour, 0.01);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = Path::new("/nonexistent/wra/config.toml");
        assert!(AdvisorConfig::load(Some(missing)).is_err());
    }

    #[test]
    fn test_default_path_location() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(".config/wra/config.toml"));
        }
    }
}
