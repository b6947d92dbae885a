//! Router configuration: domain catalog, health, selection and load tuning.

use crate::error::{Result, RoutingError};
use crate::types::{Domain, Worker};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on validators per request accepted by [`RouterConfig::validate`].
pub const MAX_VALIDATORS_LIMIT: usize = 16;

/// Complete router configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Known domains and the fallback for unknown names
    pub domains: DomainConfig,
    /// Health evaluation settings
    pub health: HealthConfig,
    /// Selection tuning constants
    pub selection: SelectionConfig,
    /// Load accounting settings
    pub load: LoadConfig,
    /// Workers registered when a router is built from this configuration
    pub workers: Vec<Worker>,
}

/// Domain catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Configured domain names
    pub names: Vec<String>,
    /// Domain used when a request names an unknown domain
    pub fallback: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            names: ["medical", "cardiology", "cancer", "neurology", "ai_compliance"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            fallback: "medical".to_owned(),
        }
    }
}

impl DomainConfig {
    /// All configured domains in declaration order.
    pub fn domains(&self) -> impl Iterator<Item = Domain> + '_ {
        self.names.iter().map(Domain::new)
    }

    /// Whether `domain` is part of the catalog.
    pub fn contains(&self, domain: &Domain) -> bool {
        self.domains().any(|known| &known == domain)
    }

    /// Maps a free-form domain name onto a configured domain.
    ///
    /// Unknown names resolve to the fallback domain.
    pub fn resolve(&self, name: &str) -> Domain {
        let domain = Domain::new(name);
        if self.contains(&domain) {
            domain
        } else {
            let fallback = Domain::new(&self.fallback);
            warn!(requested = name, fallback = %fallback, "unknown domain, using fallback");
            fallback
        }
    }
}

/// Health evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds after which a worker's health is recomputed lazily
    pub check_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
        }
    }
}

impl HealthConfig {
    /// The recheck interval as a `Duration`.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Selection tuning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Maximum validation workers per request
    pub max_validators: usize,
    /// Response time at or below which latency does not reduce weight
    pub response_time_baseline_ms: f64,
    /// Weight multiplier applied to degraded workers
    pub degraded_penalty: f64,
    /// Floor of the load factor so saturated workers keep a small chance
    pub min_load_factor: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_validators: 2,
            response_time_baseline_ms: 1000.0,
            degraded_penalty: 0.5,
            min_load_factor: 0.1,
        }
    }
}

/// Load accounting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Seconds after which an uncompleted load lease is reclaimed (`None` disables)
    pub lease_timeout_secs: Option<u64>,
    /// Smoothing factor for observed response times (0, 1]
    pub response_time_smoothing: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            lease_timeout_secs: None,
            response_time_smoothing: 0.2,
        }
    }
}

impl LoadConfig {
    /// The lease timeout as a `Duration`, if reclamation is enabled.
    pub fn lease_timeout(&self) -> Option<Duration> {
        self.lease_timeout_secs.map(Duration::from_secs)
    }
}

impl RouterConfig {
    /// Get the default config directory path (`~/.adp`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RoutingError::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".adp"))
    }

    /// Get the default config file path (`~/.adp/router.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("router.toml"))
    }

    /// Load config from the default location, creating it with defaults if missing
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Parse and validate config from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or fails validation
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!(
            path = %path.display(),
            domains = config.domains.names.len(),
            workers = config.workers.len(),
            "loaded router config"
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        let header = "# ADP Router Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize domains, tuning and workers\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Check the configuration for values the router cannot work with
    ///
    /// # Errors
    /// Returns `Config` or `InvalidWorker` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.domains.names.is_empty() {
            return Err(RoutingError::Config("at least one domain is required".to_owned()));
        }
        if !self.domains.contains(&Domain::new(&self.domains.fallback)) {
            return Err(RoutingError::Config(format!(
                "fallback domain '{}' is not a configured domain",
                self.domains.fallback
            )));
        }
        if self.selection.max_validators > MAX_VALIDATORS_LIMIT {
            return Err(RoutingError::Config(format!(
                "max_validators must be at most {MAX_VALIDATORS_LIMIT}, got {}",
                self.selection.max_validators
            )));
        }
        if !(self.selection.response_time_baseline_ms > 0.0) {
            return Err(RoutingError::Config(
                "response_time_baseline_ms must be positive".to_owned(),
            ));
        }
        for (name, value) in [
            ("degraded_penalty", self.selection.degraded_penalty),
            ("min_load_factor", self.selection.min_load_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RoutingError::Config(format!(
                    "{name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }
        let smoothing = self.load.response_time_smoothing;
        if !(smoothing > 0.0 && smoothing <= 1.0) {
            return Err(RoutingError::Config(format!(
                "response_time_smoothing must be in (0.0, 1.0], got {smoothing}"
            )));
        }
        for worker in &self.workers {
            worker.validate()?;
        }
        Ok(())
    }
}
