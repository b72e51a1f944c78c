//! settle configuration (`~/.config/settle/config.toml`).
//!
//! ```toml
//! [classifier]
//! retryable_codes = ["InternalError", "ResourceInUse"]
//!
//! [rate_limit]
//! requests_per_second = 10.0
//! burst = 20
//!
//! [profiles.cvm-boot]
//! family = "cvm-instance"
//! pending = ["PENDING", "STARTING"]
//! target = ["RUNNING"]
//! timeout = "10m"
//! interval = "5s"
//! not_found = "tolerate"
//! not_found_checks = 5
//! ```

use crate::defaults::DEFAULT_RETRYABLE_CODES;
use crate::policy::{self, NotFoundMode, PolicySettings};
use crate::resource::{FamilyKind, Operation};
use anyhow::{Context, Result};
use convergence::{ClassifierConfig, ErrorClassifier, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Replaces the built-in retryable code list when present
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,

    /// Shared token bucket for describe and submit calls
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Named convergence policies for `settle wait --profile`
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// A named convergence policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub family: Option<FamilyKind>,
    pub operation: Option<Operation>,
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    /// Human-readable duration, e.g. "10m"
    pub timeout: Option<String>,
    pub interval: Option<String>,
    pub not_found: Option<NotFoundMode>,
    pub not_found_checks: Option<u32>,
    pub occurrences: Option<u32>,
}

impl ProfileConfig {
    /// Convert to policy settings, parsing the duration strings.
    pub fn settings(&self) -> Result<PolicySettings> {
        Ok(PolicySettings {
            operation: self.operation,
            pending: self.pending.clone(),
            target: self.target.clone(),
            timeout: parse_duration("timeout", self.timeout.as_deref())?,
            interval: parse_duration("interval", self.interval.as_deref())?,
            not_found: self.not_found,
            not_found_checks: self.not_found_checks,
            occurrences: self.occurrences,
        })
    }
}

fn parse_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|text| {
            humantime::parse_duration(text)
                .with_context(|| format!("Invalid {field} '{text}' (expected e.g. \"90s\", \"5m\")"))
        })
        .transpose()
}

impl Config {
    /// Default config location
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("settle").join("config.toml"))
    }

    /// Load from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the default config;
    /// a missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate().context("Invalid [rate_limit]")?;
        }

        for (name, profile) in &self.profiles {
            let family = profile
                .family
                .with_context(|| format!("Profile '{name}' has no family"))?;
            let settings = profile
                .settings()
                .with_context(|| format!("Invalid profile '{name}'"))?;
            policy::check(family, &settings).with_context(|| format!("Invalid profile '{name}'"))?;
        }

        Ok(())
    }

    /// Classifier from config, falling back to the built-in codes
    pub fn classifier(&self) -> ErrorClassifier {
        match &self.classifier {
            Some(config) => ErrorClassifier::from_config(config),
            None => ErrorClassifier::new(DEFAULT_RETRYABLE_CODES.iter().copied()),
        }
    }

    pub fn profile(&self, name: &str) -> Result<&ProfileConfig> {
        self.profiles.get(name).with_context(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            if known.is_empty() {
                format!("Unknown profile '{name}' (no profiles configured)")
            } else {
                format!("Unknown profile '{name}' (known: {})", known.join(", "))
            }
        })
    }
}
