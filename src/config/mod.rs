pub mod runtime;
pub use runtime::{new_monitoring_flags, GlobalFlag, MonitoringFlags, SharedMonitoringFlags};

use crate::auth::ApiUser;
use crate::checkable::{Checkable, CheckableRef, ObjectStore};
use crate::subscription::{OverflowPolicy, ReconfigurePolicy, RegistryOptions};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "LOOKOUT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "lookout.toml";

/// Complete Lookout configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookoutConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub monitoring: MonitoringFlags,
    /// No users = authentication disabled
    #[serde(default)]
    pub api_users: Vec<ApiUser>,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5665".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Event queue limits and policies
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Pending events buffered per subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default)]
    pub reconfigure: ReconfigurePolicy,
    /// TTL for queues that do not pass one; 0 = removed on last detach
    #[serde(default)]
    pub default_ttl_seconds: f64,
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
}

fn default_subscriber_buffer() -> usize {
    1024
}

fn default_reaper_interval() -> u64 {
    30
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            overflow: OverflowPolicy::default(),
            reconfigure: ReconfigurePolicy::default(),
            default_ttl_seconds: 0.0,
            reaper_interval_seconds: default_reaper_interval(),
        }
    }
}

impl EventsConfig {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            subscriber_buffer: self.subscriber_buffer,
            overflow: self.overflow,
            reconfigure: self.reconfigure,
        }
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds.max(1))
    }
}

/// Check settings shared by hosts and services
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSettings {
    #[serde(default = "default_true")]
    pub enable_passive_checks: bool,
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,
    #[serde(default = "default_max_check_attempts")]
    pub max_check_attempts: u32,
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> f64 {
    300.0
}

fn default_max_check_attempts() -> u32 {
    3
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            enable_passive_checks: true,
            check_interval: default_check_interval(),
            max_check_attempts: default_max_check_attempts(),
        }
    }
}

impl CheckSettings {
    fn build(&self, reference: CheckableRef) -> Checkable {
        let mut checkable = Checkable::new(reference);
        checkable.enable_passive_checks = self.enable_passive_checks;
        checkable.check_interval = self.check_interval;
        checkable.max_check_attempts = self.max_check_attempts.max(1);
        checkable
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub name: String,
    #[serde(flatten)]
    pub checks: CheckSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub name: String,
    #[serde(flatten)]
    pub checks: CheckSettings,
}

impl LookoutConfig {
    /// Register every configured host and service in `store`.
    ///
    /// Returns the number of objects added.
    pub fn populate(&self, store: &ObjectStore) -> usize {
        for host in &self.hosts {
            store.insert(host.checks.build(CheckableRef::host(&host.name)));
        }
        for service in &self.services {
            store.insert(
                service
                    .checks
                    .build(CheckableRef::service(&service.host, &service.name)),
            );
        }
        self.hosts.len() + self.services.len()
    }

    /// Apply `LOOKOUT_ENABLE_*` overrides to the monitoring flags.
    pub fn with_env_overrides(mut self) -> Self {
        self.monitoring = self.monitoring.with_env_overrides();
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<LookoutConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: LookoutConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load from `path`, falling back to defaults when the file does not exist.
pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<LookoutConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(LookoutConfig::default());
    }
    load_config(path)
}

/// Configuration file path from `LOOKOUT_CONFIG`, else `lookout.toml`
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkable::{CheckableKind, SignalBus};
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = LookoutConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:5665");
        assert_eq!(config.events.subscriber_buffer, 1024);
        assert_eq!(config.events.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.events.reconfigure, ReconfigurePolicy::Replace);
        assert_eq!(config.events.default_ttl_seconds, 0.0);
        assert_eq!(config.events.reaper_interval_seconds, 30);
        assert!(config.monitoring.enable_notifications);
        assert!(config.api_users.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:8080"

            [events]
            subscriber_buffer = 16
            overflow = "disconnect"
            reconfigure = "reject_conflicting"
            default_ttl_seconds = 120
            reaper_interval_seconds = 5

            [monitoring]
            enable_flapping = false

            [[api_users]]
            name = "dashboard"
            token = "secret"
            permissions = ["events/*"]

            [[hosts]]
            name = "web-01"

            [[services]]
            host = "web-01"
            name = "http"
            enable_passive_checks = false
            check_interval = 60
            max_check_attempts = 5
        "#;

        let config: LookoutConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.events.subscriber_buffer, 16);
        assert_eq!(config.events.overflow, OverflowPolicy::Disconnect);
        assert_eq!(config.events.reconfigure, ReconfigurePolicy::RejectConflicting);
        assert_eq!(config.events.default_ttl_seconds, 120.0);
        assert!(!config.monitoring.enable_flapping);
        assert!(config.monitoring.enable_notifications);
        assert_eq!(config.api_users[0].name, "dashboard");
        assert_eq!(config.services[0].checks.max_check_attempts, 5);
        assert!(config.hosts[0].checks.enable_passive_checks);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [events]
            subscriber_buffer = 8
        "#;

        let config: LookoutConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.events.subscriber_buffer, 8);
        assert_eq!(config.events.reaper_interval_seconds, 30);
        assert_eq!(config.server.bind, "127.0.0.1:5665");
    }

    #[test]
    fn test_populate_store() {
        let toml = r#"
            [[hosts]]
            name = "db-01"
            max_check_attempts = 1

            [[services]]
            host = "db-01"
            name = "pgsql"
            check_interval = 30
        "#;
        let config: LookoutConfig = toml::from_str(toml).unwrap();
        let store = ObjectStore::new(Arc::new(SignalBus::new()));

        assert_eq!(config.populate(&store), 2);
        let host = store.get(CheckableKind::Host, "db-01").unwrap();
        assert_eq!(host.snapshot().unwrap().max_check_attempts, 1);
        let svc = store.get(CheckableKind::Service, "db-01!pgsql").unwrap();
        assert_eq!(svc.snapshot().unwrap().check_interval, 30.0);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5665");
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind = 1").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn test_monitoring_flag_toggles() {
        let mut flags = MonitoringFlags::default();
        flags.set(GlobalFlag::PerformanceData, false);
        assert!(!flags.get(GlobalFlag::PerformanceData));
        assert!(flags.get(GlobalFlag::HostChecks));

        let value = flags.to_value();
        assert_eq!(
            value.get("enable_perfdata").and_then(|v| v.as_bool()),
            Some(false)
        );
    }
}
