//! Configuration management for scantag.
//!
//! Loads the scanner list and process-wide log settings from a local JSON
//! file or from the remote configuration service.

mod remote;
mod scanner;
mod settings;

pub use remote::{merge_documents, write_with_backup, RemoteConfigClient};
pub use scanner::ScannerConfig;
pub use settings::{
    deployed_version, AppConfig, ConfigLoad, ConfigSource, LogLevel, Paths, CONFIG_FILE_NAME,
    UNKNOWN_VERSION, VERSION_FILE_NAME,
};
