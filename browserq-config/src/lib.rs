use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Worker names end up in the `worker` column and in log fields.
static WORKER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub worker: Option<WorkerSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub jobs: Option<JobsSection>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub heartbeat_interval_secs: Option<u64>,
    #[serde(default)]
    pub close_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub busy_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct JobsSection {
    #[serde(default)]
    pub definitions_path: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    load_file(path)
}

/// Deserialize any file in one of the supported formats.
///
/// Shared by the main config and auxiliary files such as job definitions.
pub fn load_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_str(&s, ext.as_deref())
}

/// Parse a document with optional format hint
#[inline]
fn parse_str<T: DeserializeOwned>(s: &str, ext: Option<&str>) -> Result<T, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_auto(s),
    }
}

/// Try to parse by attempting each enabled format
#[inline]
fn parse_auto<T: DeserializeOwned>(s: &str) -> Result<T, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse file as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete worker configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub worker: WorkerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerConfig {
    /// `None` lets the binary pick a random name at startup.
    pub name: Option<String>,
    pub poll_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub close_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsConfig {
    pub definitions_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: WorkerConfig {
                name: None,
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
                close_timeout_secs: DEFAULT_CLOSE_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                path: "browserq.sqlite".to_string(),
                max_connections: 5,
                busy_timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            jobs: JobsConfig {
                definitions_path: None,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(()),
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(worker) = raw.worker {
            apply_opt!(cfg.worker.name, worker.name, wrap);
            apply_opt!(cfg.worker.poll_interval_secs, worker.poll_interval_secs);
            apply_opt!(
                cfg.worker.heartbeat_interval_secs,
                worker.heartbeat_interval_secs
            );
            apply_opt!(cfg.worker.close_timeout_secs, worker.close_timeout_secs);
        }
        if let Some(db) = raw.database {
            apply_opt!(cfg.database.path, db.path);
            apply_opt!(cfg.database.max_connections, db.max_connections);
            apply_opt!(cfg.database.busy_timeout_secs, db.busy_timeout_secs);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(jobs) = raw.jobs {
            apply_opt!(cfg.jobs.definitions_path, jobs.definitions_path, wrap);
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Worker
    if let Some(v) = env_str("BROWSERQ_WORKER_NAME") {
        cfg.worker.name = Some(v);
    }
    if let Some(v) = env_parse::<u64>("BROWSERQ_POLL_INTERVAL_SECS")? {
        cfg.worker.poll_interval_secs = v;
    }
    if let Some(v) = env_parse::<u64>("BROWSERQ_HEARTBEAT_INTERVAL_SECS")? {
        cfg.worker.heartbeat_interval_secs = v;
    }
    if let Some(v) = env_parse::<u64>("BROWSERQ_CLOSE_TIMEOUT_SECS")? {
        cfg.worker.close_timeout_secs = v;
    }

    // Database
    if let Some(v) = env_str("BROWSERQ_DATABASE_PATH") {
        cfg.database.path = v;
    }
    if let Some(v) = env_parse::<u32>("BROWSERQ_DB_MAX_CONNECTIONS")? {
        cfg.database.max_connections = v;
    }
    if let Some(v) = env_parse::<u64>("BROWSERQ_DB_BUSY_TIMEOUT_SECS")? {
        cfg.database.busy_timeout_secs = v;
    }

    // Logging
    if let Some(v) = env_str("BROWSERQ_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("BROWSERQ_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Jobs
    if let Some(v) = env_str("BROWSERQ_JOBS_PATH") {
        cfg.jobs.definitions_path = Some(v);
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.worker.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "worker.poll_interval_secs must be > 0".into(),
        ));
    }
    if cfg.worker.heartbeat_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "worker.heartbeat_interval_secs must be > 0".into(),
        ));
    }
    if cfg.worker.close_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "worker.close_timeout_secs must be > 0".into(),
        ));
    }
    if let Some(name) = &cfg.worker.name {
        if !WORKER_NAME_REGEX.is_match(name) {
            return Err(ConfigError::Validation(format!(
                "invalid worker.name: {name:?}"
            )));
        }
    }
    if cfg.database.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database.path must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_with_ext(ext: &str, contents: &str) -> tempfile::TempPath {
        let f = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .expect("tmpfile");
        std::fs::write(f.path(), contents).unwrap();
        f.into_temp_path()
    }

    #[test]
    fn parse_toml() {
        let path = temp_with_ext(
            "toml",
            r#"
[worker]
name = "worker-a"
poll_interval_secs = 2

[database]
path = "queue.sqlite"
"#,
        );
        let cfg = load_config(Some(&path)).expect("load");
        assert_eq!(cfg.worker.name.as_deref(), Some("worker-a"));
        assert_eq!(cfg.worker.poll_interval_secs, 2);
        assert_eq!(cfg.worker.heartbeat_interval_secs, DEFAULT_HEARTBEAT_INTERVAL_SECS);
        assert_eq!(cfg.database.path, "queue.sqlite");
    }

    #[test]
    fn parse_yaml() {
        let path = temp_with_ext(
            "yaml",
            r#"
logging:
  level: debug
  json: true
jobs:
  definitions_path: jobs.yaml
"#,
        );
        let cfg = load_config(Some(&path)).expect("load");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert_eq!(cfg.jobs.definitions_path.as_deref(), Some("jobs.yaml"));
    }

    #[test]
    fn parse_without_extension_detects_format() {
        let f = NamedTempFile::new().expect("tmpfile");
        std::fs::write(f.path(), r#"{"worker": {"close_timeout_secs": 9}}"#).unwrap();
        let raw = load_raw_from_file(f.path()).expect("load");
        assert_eq!(raw.worker.unwrap().close_timeout_secs, Some(9));
    }

    #[test]
    fn load_file_is_generic() {
        #[derive(Deserialize)]
        struct Doc {
            items: Vec<String>,
        }
        let path = temp_with_ext("json", r#"{"items": ["a", "b"]}"#);
        let doc: Doc = load_file(&path).expect("load");
        assert_eq!(doc.items, vec!["a", "b"]);
    }

    // Only touches keys that no other test here asserts on.
    #[test]
    fn env_overrides() {
        let keys = [
            "BROWSERQ_CLOSE_TIMEOUT_SECS",
            "BROWSERQ_DB_MAX_CONNECTIONS",
            "BROWSERQ_DB_BUSY_TIMEOUT_SECS",
        ];

        std::env::set_var("BROWSERQ_CLOSE_TIMEOUT_SECS", "9");
        std::env::set_var("BROWSERQ_DB_MAX_CONNECTIONS", " 2 ");
        std::env::set_var("BROWSERQ_DB_BUSY_TIMEOUT_SECS", "1");

        let cfg = load_config::<&Path>(None).expect("load config");
        assert_eq!(cfg.worker.close_timeout_secs, 9);
        assert_eq!(cfg.database.max_connections, 2);
        assert_eq!(cfg.database.busy_timeout_secs, 1);

        for k in &keys {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn validation() {
        assert!(validate_config(&Config::default()).is_ok());

        let mut cfg = Config::default();
        cfg.worker.poll_interval_secs = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.worker.name = Some("worker a".into());
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.database.path = "  ".into();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("ON"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
