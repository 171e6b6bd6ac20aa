/// Process configuration and runtime enrollment settings
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{env, fs};
use thiserror::Error;
use tracing::info;

use crate::enrollment::SchedulePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Top-level configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub address: String,
    pub port: u16,
    pub database_path: String,
    /// Deadline applied to each enrollment request, in milliseconds
    pub request_timeout_ms: u64,
    /// SQLite busy timeout, in milliseconds
    pub store_busy_timeout_ms: u64,
    /// Insert a handful of demo students and courses on startup
    pub seed_demo_data: bool,
    /// Initial enrollment settings; adjustable at runtime afterwards
    pub enrollment: EnrollmentSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
            database_path: "tms_database.db".to_string(),
            request_timeout_ms: 5_000,
            store_busy_timeout_ms: 2_000,
            seed_demo_data: false,
            enrollment: EnrollmentSettings::default(),
        }
    }
}

/// Enrollment rules in force for a request.
///
/// A copy is taken once per request and handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentSettings {
    /// When set, only courses offered in this semester accept enrollments
    pub current_semester: Option<String>,
    pub enrollment_open: bool,
    /// Active enrollments a student may hold per semester; `None` for no cap
    pub max_enrollments_per_student: Option<u32>,
    pub schedule_policy: SchedulePolicy,
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            current_semester: None,
            enrollment_open: true,
            max_enrollments_per_student: Some(10),
            schedule_policy: SchedulePolicy::Permissive,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the JSON file named by `TMS_CONFIG` (if any),
    /// then applies `TMS_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("TMS_CONFIG") {
            Ok(path) => Self::load_from_file(Path::new(&path))?,
            Err(_) => {
                info!("TMS_CONFIG not set, using default configuration");
                Self::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TMS_DB_PATH") {
            self.database_path = path;
        }
        if let Some(address) = lookup("TMS_ADDRESS") {
            self.address = address;
        }
        if let Some(port) = lookup("TMS_PORT") {
            self.port = parse_value("TMS_PORT", &port)?;
        }
        if let Some(timeout) = lookup("TMS_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_value("TMS_REQUEST_TIMEOUT_MS", &timeout)?;
        }
        if let Some(semester) = lookup("TMS_CURRENT_SEMESTER") {
            self.enrollment.current_semester = Some(semester).filter(|s| !s.is_empty());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "port": 9100, "enrollment": { "schedule_policy": "strict" } }"#,
        )
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.enrollment.schedule_policy, SchedulePolicy::Strict);
        assert!(config.enrollment.enrollment_open);
        assert_eq!(config.enrollment.max_enrollments_per_student, Some(10));
    }

    #[test]
    fn test_load_from_file() {
        let path = env::temp_dir().join(format!("tms-config-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "database_path": "/var/lib/tms.db", "enrollment": { "enrollment_open": false } }"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.database_path, "/var/lib/tms.db");
        assert!(!config.enrollment.enrollment_open);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TMS_PORT", "8443"),
            ("TMS_DB_PATH", ":memory:"),
            ("TMS_CURRENT_SEMESTER", "2024 Spring"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 8443);
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(
            config.enrollment.current_semester.as_deref(),
            Some("2024 Spring")
        );
    }

    #[test]
    fn test_invalid_override() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "TMS_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
