//! Configuration for the authorization core binary: store backend, cache
//! thresholds, audit mode, and the legacy adapter toggle. Loaded from
//! environment variables (`AEGIS_*`) layered over an optional TOML file,
//! via the `config` crate.

use std::time::Duration;

use config::{Config as ConfigSource, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Embedded,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditModeConfig {
    Minimal,
    Full,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    pub embedded_path: Option<String>,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_max_reload_interval_secs")]
    pub max_reload_interval_secs: u64,
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_max_reload_interval_secs() -> u64 {
    60
}

impl CacheSettings {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn max_reload_interval(&self) -> Duration {
        Duration::from_secs(self.max_reload_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditSettings {
    #[serde(default = "default_audit_mode")]
    pub mode: AuditModeConfig,
    #[serde(default = "default_wal_path")]
    pub wal_path: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_audit_mode() -> AuditModeConfig {
    AuditModeConfig::Minimal
}

fn default_wal_path() -> String {
    "aegis-audit.wal".to_string()
}

fn default_log_path() -> String {
    "aegis-audit.ndjson".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LegacySettings {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub audit: AuditSettings,
    #[serde(default)]
    pub legacy: LegacySettings,
}

impl Settings {
    /// Loads config from (in increasing precedence) `aegis.toml` if
    /// present, then `AEGIS_*` environment variables with `__` as the
    /// nesting separator (e.g. `AEGIS_CACHE__STALE_AFTER_SECS`).
    pub fn load() -> Result<Self, ConfigError> {
        ConfigSource::builder()
            .set_default("store.backend", "memory")?
            .set_default("cache.stale_after_secs", 300)?
            .set_default("cache.max_reload_interval_secs", 60)?
            .set_default("audit.mode", "minimal")?
            .set_default("audit.wal_path", "aegis-audit.wal")?
            .set_default("audit.log_path", "aegis-audit.ndjson")?
            .set_default("audit.queue_capacity", 1024)?
            .set_default("legacy.enabled", false)?
            .add_source(File::with_name("aegis").required(false))
            .add_source(Environment::with_prefix("aegis").separator("__"))
            .build()?
            .try_deserialize()
    }
}
