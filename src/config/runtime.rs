use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Process-wide monitoring behaviour switches.
///
/// Toggled at runtime by the `modify_global_*` actions; changes take effect
/// immediately without restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringFlags {
    pub enable_notifications: bool,
    pub enable_flapping: bool,
    pub enable_event_handlers: bool,
    pub enable_perfdata: bool,
    pub enable_service_checks: bool,
    pub enable_host_checks: bool,
}

impl Default for MonitoringFlags {
    fn default() -> Self {
        Self {
            enable_notifications: true,
            enable_flapping: true,
            enable_event_handlers: true,
            enable_perfdata: true,
            enable_service_checks: true,
            enable_host_checks: true,
        }
    }
}

/// One of the six global switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalFlag {
    Notifications,
    FlapDetection,
    EventHandlers,
    PerformanceData,
    ServiceChecks,
    HostChecks,
}

impl GlobalFlag {
    pub const ALL: [GlobalFlag; 6] = [
        GlobalFlag::Notifications,
        GlobalFlag::FlapDetection,
        GlobalFlag::EventHandlers,
        GlobalFlag::PerformanceData,
        GlobalFlag::ServiceChecks,
        GlobalFlag::HostChecks,
    ];

    /// Human-readable name used in action status messages
    pub fn description(&self) -> &'static str {
        match self {
            GlobalFlag::Notifications => "notifications",
            GlobalFlag::FlapDetection => "flap detection",
            GlobalFlag::EventHandlers => "event handlers",
            GlobalFlag::PerformanceData => "performance data processing",
            GlobalFlag::ServiceChecks => "service check execution",
            GlobalFlag::HostChecks => "host check execution",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            GlobalFlag::Notifications => "LOOKOUT_ENABLE_NOTIFICATIONS",
            GlobalFlag::FlapDetection => "LOOKOUT_ENABLE_FLAPPING",
            GlobalFlag::EventHandlers => "LOOKOUT_ENABLE_EVENT_HANDLERS",
            GlobalFlag::PerformanceData => "LOOKOUT_ENABLE_PERFDATA",
            GlobalFlag::ServiceChecks => "LOOKOUT_ENABLE_SERVICE_CHECKS",
            GlobalFlag::HostChecks => "LOOKOUT_ENABLE_HOST_CHECKS",
        }
    }

    fn field_name(&self) -> &'static str {
        match self {
            GlobalFlag::Notifications => "enable_notifications",
            GlobalFlag::FlapDetection => "enable_flapping",
            GlobalFlag::EventHandlers => "enable_event_handlers",
            GlobalFlag::PerformanceData => "enable_perfdata",
            GlobalFlag::ServiceChecks => "enable_service_checks",
            GlobalFlag::HostChecks => "enable_host_checks",
        }
    }
}

impl MonitoringFlags {
    pub fn get(&self, flag: GlobalFlag) -> bool {
        match flag {
            GlobalFlag::Notifications => self.enable_notifications,
            GlobalFlag::FlapDetection => self.enable_flapping,
            GlobalFlag::EventHandlers => self.enable_event_handlers,
            GlobalFlag::PerformanceData => self.enable_perfdata,
            GlobalFlag::ServiceChecks => self.enable_service_checks,
            GlobalFlag::HostChecks => self.enable_host_checks,
        }
    }

    pub fn set(&mut self, flag: GlobalFlag, enabled: bool) {
        let field = match flag {
            GlobalFlag::Notifications => &mut self.enable_notifications,
            GlobalFlag::FlapDetection => &mut self.enable_flapping,
            GlobalFlag::EventHandlers => &mut self.enable_event_handlers,
            GlobalFlag::PerformanceData => &mut self.enable_perfdata,
            GlobalFlag::ServiceChecks => &mut self.enable_service_checks,
            GlobalFlag::HostChecks => &mut self.enable_host_checks,
        };
        *field = enabled;
    }

    /// Apply `LOOKOUT_ENABLE_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        for flag in GlobalFlag::ALL {
            if let Ok(v) = std::env::var(flag.env_var()) {
                if let Ok(b) = v.parse::<bool>() {
                    self.set(flag, b);
                }
            }
        }
        self
    }

    pub fn to_value(&self) -> Value {
        let map: Map = GlobalFlag::ALL
            .iter()
            .map(|flag| (flag.field_name().to_string(), Value::from(self.get(*flag))))
            .collect();
        Value::Map(map)
    }
}

pub type SharedMonitoringFlags = Arc<RwLock<MonitoringFlags>>;

pub fn new_monitoring_flags(initial: MonitoringFlags) -> SharedMonitoringFlags {
    Arc::new(RwLock::new(initial))
}
