//! Configuration management.

use crate::handlers::{ConfiguredExporter, ConfiguredImporter};
use crate::io::services::{DEFAULT_EXPORT_DIR, DEFAULT_IMPORT_DIR, ServiceSettings};
use crate::io::validation::RuleSet;
use crate::models::JobQuery;
use crate::observability::LogFormat;
use crate::registry::TypeRegistry;
use crate::storage::{Disk, LocalDisk, MemoryDisk, RecordStore};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable selecting the active disk.
pub const DISK_ENV: &str = "TABPORT_DISK";

/// Name of the default disk.
pub const DEFAULT_DISK: &str = "local";

/// Main configuration for tabport.
#[derive(Debug, Clone, PartialEq)]
pub struct TabportConfig {
    /// Name of the disk uploads and artifacts are stored on.
    pub disk: String,
    /// Declared disks by name.
    pub disks: BTreeMap<String, DiskConfig>,
    /// Path to the data directory.
    pub data_dir: PathBuf,
    /// Ledger database; defaults to `{data_dir}/tabport.db`.
    pub database: Option<PathBuf>,
    /// Directory for stored uploads on the disk.
    pub import_dir: String,
    /// Directory for generated artifacts on the disk.
    pub export_dir: String,
    /// Default page size for job listings.
    pub per_page: u32,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Types served by configured handlers.
    pub types: BTreeMap<String, TypeDefinition>,
}

/// A storage disk declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiskConfig {
    /// Backend: `local` or `memory`.
    pub driver: String,
    /// Root directory for `local` disks; defaults to `{data_dir}/files`.
    pub root: Option<PathBuf>,
}

impl DiskConfig {
    fn local() -> Self {
        Self {
            driver: "local".to_string(),
            root: None,
        }
    }
}

/// Logging section in config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Output format.
    pub format: Option<LogFormat>,
    /// Level filter directive.
    pub level: Option<String>,
    /// Log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// A type served by configured handlers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeDefinition {
    /// Ordered header schema.
    pub headers: Vec<String>,
    /// Column → rule string, e.g. `required|email`.
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
    /// Register an importer.
    #[serde(default = "enabled")]
    pub import: bool,
    /// Register an exporter.
    #[serde(default = "enabled")]
    pub export: bool,
}

const fn enabled() -> bool {
    true
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Active disk.
    pub disk: Option<String>,
    /// Disk declarations.
    pub disks: Option<BTreeMap<String, DiskConfig>>,
    /// Data directory.
    pub data_dir: Option<String>,
    /// Ledger database path.
    pub database: Option<String>,
    /// Upload directory.
    pub import_dir: Option<String>,
    /// Artifact directory.
    pub export_dir: Option<String>,
    /// Default page size.
    pub per_page: Option<u32>,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Configured types.
    pub types: Option<BTreeMap<String, TypeDefinition>>,
}

impl Default for TabportConfig {
    fn default() -> Self {
        Self {
            disk: DEFAULT_DISK.to_string(),
            disks: BTreeMap::from([(DEFAULT_DISK.to_string(), DiskConfig::local())]),
            data_dir: PathBuf::from(".tabport"),
            database: None,
            import_dir: DEFAULT_IMPORT_DIR.to_string(),
            export_dir: DEFAULT_EXPORT_DIR.to_string(),
            per_page: JobQuery::DEFAULT_PER_PAGE,
            logging: None,
            types: BTreeMap::new(),
        }
    }
}

impl TabportConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// out-of-range page size.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", e))?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/tabport/` on macOS)
    /// 2. XDG config dir (`~/.config/tabport/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("tabport").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("tabport")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `TabportConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(disk) = file.disk {
            config.disk = disk;
        }
        if let Some(disks) = file.disks {
            config.disks.extend(disks);
        }
        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.database = file.database.map(PathBuf::from);
        if let Some(import_dir) = file.import_dir {
            config.import_dir = import_dir;
        }
        if let Some(export_dir) = file.export_dir {
            config.export_dir = export_dir;
        }
        if let Some(per_page) = file.per_page {
            if !(1..=JobQuery::MAX_PER_PAGE).contains(&per_page) {
                return Err(Error::InvalidInput(format!(
                    "per_page must be between 1 and {}, got {per_page}",
                    JobQuery::MAX_PER_PAGE
                )));
            }
            config.per_page = per_page;
        }
        config.logging = file.logging;
        if let Some(types) = file.types {
            config.types = types;
        }

        Ok(config)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(disk) = lookup(DISK_ENV).filter(|d| !d.trim().is_empty()) {
            self.disk = disk.trim().to_string();
        }
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Returns the ledger database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tabport.db"))
    }

    /// Returns the service directory and paging settings.
    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            import_dir: self.import_dir.clone(),
            export_dir: self.export_dir.clone(),
            per_page: self.per_page,
        }
    }

    /// Opens the active disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the disk is not declared or names
    /// an unknown driver.
    pub fn open_disk(&self) -> Result<Arc<dyn Disk>> {
        let declared = self
            .disks
            .get(&self.disk)
            .ok_or_else(|| Error::InvalidInput(format!("disk '{}' is not configured", self.disk)))?;

        match declared.driver.as_str() {
            "local" => {
                let root = declared
                    .root
                    .clone()
                    .unwrap_or_else(|| self.data_dir.join("files"));
                Ok(Arc::new(LocalDisk::new(root).with_name(self.disk.clone())))
            },
            "memory" => Ok(Arc::new(MemoryDisk::new().with_name(self.disk.clone()))),
            other => Err(Error::InvalidInput(format!(
                "disk '{}' has unknown driver '{other}'",
                self.disk
            ))),
        }
    }

    /// Builds a registry serving every configured type.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule string does not parse or a type definition
    /// is rejected by the registry.
    pub fn build_registry(&self, store: &Arc<RecordStore>) -> Result<TypeRegistry> {
        let mut builder = TypeRegistry::builder();

        for (name, definition) in &self.types {
            if definition.import {
                let rules = RuleSet::from_map(&definition.rules).map_err(|e| {
                    Error::InvalidInput(format!("rules for type [{name}]: {e}"))
                })?;
                builder = builder.importer(
                    name.clone(),
                    ConfiguredImporter::new(
                        name.clone(),
                        definition.headers.clone(),
                        rules,
                        Arc::clone(store),
                    ),
                );
            }
            if definition.export {
                builder = builder.exporter(
                    name.clone(),
                    ConfiguredExporter::new(
                        name.clone(),
                        definition.headers.clone(),
                        Arc::clone(store),
                    ),
                );
            }
        }

        builder.build()
    }
}
