//! Application settings and paths.
//!
//! Settings come from a JSON document. The document may be the full form
//! (`log_level`, `log_retention_days`, `scanner_configurations`), a bare array
//! of scanner entries, or a single scanner entry.

use super::scanner::{ScannerConfig, ScannerEntry};
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "scantag.json";

/// Name of the deployment version file shipped next to the configuration.
pub const VERSION_FILE_NAME: &str = "verze.json";

/// Reported when no deployment version can be read.
pub const UNKNOWN_VERSION: &str = "unknown";

const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Directories the application reads from and writes to.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Directory holding the running executable.
    pub exe_dir: PathBuf,
    /// Per-user configuration directory (~/.config/scantag).
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve paths for the current process.
    pub fn resolve() -> ConfigResult<Self> {
        let exe = std::env::current_exe()?;
        let exe_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or(ConfigError::DirectoryNotFound)?;
        let project =
            ProjectDirs::from("com", "scantag", "scantag").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            exe_dir,
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Configuration file next to the executable if present, else the user config dir.
    pub fn config_file(&self) -> PathBuf {
        let local = self.exe_dir.join("conf").join(CONFIG_FILE_NAME);
        if local.exists() {
            local
        } else {
            self.config_dir.join(CONFIG_FILE_NAME)
        }
    }

    /// Default directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.exe_dir.join("log")
    }

    /// Certificate store for the OPC UA client.
    pub fn pki_dir(&self) -> PathBuf {
        self.config_dir.join("pki")
    }

    /// Deployment version file, `conf/verze.json` next to the executable.
    pub fn version_file(&self) -> PathBuf {
        self.exe_dir.join("conf").join(VERSION_FILE_NAME)
    }
}

/// Deployment version recorded in `path` under `verze`, else `version`.
///
/// A missing or unreadable file, or one with neither key, yields
/// [`UNKNOWN_VERSION`].
pub fn deployed_version(path: &Path) -> String {
    let document = fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok());

    document
        .as_ref()
        .and_then(|d| d.get("verze").or_else(|| d.get("version")))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

/// Operator-facing log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file was missing; built-in defaults were used.
    Defaults(PathBuf),
    Remote(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults(path) => write!(f, "built-in defaults ({} not found)", path.display()),
            Self::Remote(url) => write!(f, "remote service {}", url),
        }
    }
}

/// A configuration plus the notes gathered while loading it.
///
/// Loading happens before logging is initialised, so warnings are carried
/// here and logged by the caller.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: AppConfig,
    pub source: ConfigSource,
    pub warnings: Vec<String>,
}

/// Process-wide settings and the ordered scanner list.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: LogLevel,
    pub log_retention_days: u32,
    pub scanners: Vec<ScannerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_retention_days: DEFAULT_RETENTION_DAYS,
            scanners: vec![ScannerConfig::default_for(0)],
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<ConfigLoad> {
        if !path.exists() {
            return Ok(ConfigLoad {
                config: Self::default(),
                source: ConfigSource::Defaults(path.to_path_buf()),
                warnings: vec![format!("config file not found: {}", path.display())],
            });
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| ConfigError::InvalidFormat(format!("{}: {}", path.display(), e)))?;

        let (config, warnings) = Self::from_document(&document)?;
        Ok(ConfigLoad {
            config,
            source: ConfigSource::File(path.to_path_buf()),
            warnings,
        })
    }

    /// Build a configuration from any of the accepted document shapes.
    pub fn from_document(document: &Value) -> ConfigResult<(Self, Vec<String>)> {
        let mut warnings = Vec::new();

        let entries: Vec<Value> = match document {
            Value::Array(items) => items.clone(),
            Value::Object(root) => match root.get("scanner_configurations") {
                Some(Value::Array(items)) if !items.is_empty() => items.clone(),
                _ => vec![document.clone()],
            },
            other => {
                return Err(ConfigError::InvalidFormat(format!(
                    "expected an object or array, found {}",
                    other
                )))
            }
        };

        let scanners = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<ScannerEntry>(entry)
                    .map(|e| e.resolve(index))
                    .map_err(|e| ConfigError::InvalidFormat(format!("scanner {}: {}", index + 1, e)))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let root = document.as_object();
        let log_level = match root.and_then(|r| r.get("log_level")).and_then(Value::as_str) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warnings.push(format!("{}, using INFO", e));
                LogLevel::Info
            }),
            None => LogLevel::Info,
        };
        let log_retention_days = match root.and_then(|r| r.get("log_retention_days")) {
            Some(raw) => retention_days(raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "invalid log_retention_days {}, using {}",
                    raw, DEFAULT_RETENTION_DAYS
                ));
                DEFAULT_RETENTION_DAYS
            }),
            None => DEFAULT_RETENTION_DAYS,
        };

        Ok((
            Self {
                log_level,
                log_retention_days,
                scanners,
            },
            warnings,
        ))
    }

    /// Full-form JSON document for this configuration.
    pub fn to_document(&self) -> ConfigResult<Value> {
        let scanners = self
            .scanners
            .iter()
            .map(|s| serde_json::to_value(s).map_err(ConfigError::from))
            .collect::<ConfigResult<Vec<_>>>()?;

        let mut root = Map::new();
        root.insert("log_level".into(), json!(self.log_level.to_string()));
        root.insert("log_retention_days".into(), json!(self.log_retention_days));
        root.insert("scanner_configurations".into(), Value::Array(scanners));
        Ok(Value::Object(root))
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.to_document()?)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Retention may arrive as a number or a numeric string.
pub(crate) fn retention_days(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
