//! `imex.toml`: where the store, registry and reports live, and how hard to
//! try when the registry misbehaves.

use imex_central::{Credentials, DEFAULT_BATCH_SIZE};
use imex_engine::{RetryPolicy, RetryPolicyError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "imex.toml";
pub const DEFAULT_STORE_PATH: &str = "store.jsonl";
pub const DEFAULT_REGISTRY_PATH: &str = "registry.json";
pub const DEFAULT_REPORT_DIR: &str = "report";
pub const DEFAULT_USERNAME_ENV: &str = "IMEX_USERNAME";
pub const DEFAULT_PASSWORD_ENV: &str = "IMEX_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {path}: {message}")]
    Write { path: String, message: String },

    #[error("registry.institution must be set")]
    MissingInstitution,

    #[error("missing registry credential: environment variable {var} is not set")]
    MissingCredential { var: String },

    #[error("allocator.batch_size must be at least 1")]
    InvalidBatchSize,

    #[error(transparent)]
    InvalidRetry(#[from] RetryPolicyError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub registry: RegistrySection,
    pub allocator: AllocatorSection,
    pub retry: RetrySection,
    pub store: StoreSection,
    pub report: ReportSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    pub path: PathBuf,
    pub institution: String,
    pub username_env: String,
    pub password_env: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            institution: String::new(),
            username_env: DEFAULT_USERNAME_ENV.to_string(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorSection {
    pub batch_size: u64,
}

impl Default for AllocatorSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    pub dir: PathBuf,
    /// Optional JSONL event log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<PathBuf>,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_REPORT_DIR),
            events: None,
        }
    }
}

impl Config {
    /// Read `path`, resolving relative paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Load `path` if it exists. A missing file is only tolerated at the
    /// default location, where it means "all defaults".
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: DEFAULT_CONFIG_PATH.to_string(),
            message: e.to_string(),
        })
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let body = self.to_toml_string()?;
        fs::write(path, body).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.registry.path);
        resolve(&mut self.store.path);
        resolve(&mut self.report.dir);
        if let Some(events) = self.report.events.as_mut() {
            resolve(events);
        }
    }

    /// Checks everything `imex assign` needs except credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.institution.trim().is_empty() {
            return Err(ConfigError::MissingInstitution);
        }
        if self.allocator.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        self.retry_policy()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )?)
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_from(|var| std::env::var(var).ok())
    }

    pub fn credentials_from(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, ConfigError> {
        let read = |var: &str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential {
                    var: var.to_string(),
                })
        };
        Ok(Credentials::new(
            read(&self.registry.username_env)?,
            read(&self.registry.password_env)?,
        ))
    }
}
