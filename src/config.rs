//! Launcher configuration (`launcher.json`) and on-disk layout.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "launcher.json";
pub const DEFAULT_SYSTEM_FOLDER: &str = "system";
const STAGING_FOLDER: &str = "temp";

/// Values the launcher is built with. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct LauncherConfig {
    #[serde(rename = "LauncherVersion", default)]
    pub launcher_version: String,
    #[serde(rename = "VersionJsonUrl", default)]
    pub version_manifest_url: String,
    /// Game executable, relative to the system bundle folder.
    #[serde(rename = "StartFile", default)]
    pub start_file: String,
    #[serde(rename = "LauncherTitle", default)]
    pub title: String,
    #[serde(rename = "SystemFolder", default)]
    pub system_folder: Option<String>,
    /// Relay used for hosted-provider links (see [`crate::fetch`]).
    #[serde(rename = "ProviderProxyUrl", default)]
    pub provider_proxy_url: Option<String>,
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(crate::utils::strip_bom(raw))
    }

    pub fn manifest_url(&self) -> Result<&str, ConfigError> {
        non_empty(&self.version_manifest_url).ok_or(ConfigError::Missing("VersionJsonUrl"))
    }

    pub fn start_file(&self) -> Result<&str, ConfigError> {
        non_empty(&self.start_file).ok_or(ConfigError::Missing("StartFile"))
    }

    pub fn provider_proxy(&self) -> Option<&str> {
        self.provider_proxy_url.as_deref().and_then(non_empty)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Where the launcher keeps its files. Every component gets these paths
/// explicitly instead of looking at the process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    base_dir: PathBuf,
    system_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(base_dir: impl Into<PathBuf>, config: &LauncherConfig) -> Self {
        let base_dir = base_dir.into();
        let folder = config
            .system_folder
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(DEFAULT_SYSTEM_FOLDER);
        let system_dir = base_dir.join(folder);
        Self {
            base_dir,
            system_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn system_dir(&self) -> &Path {
        &self.system_dir
    }

    /// Stable folder used when a development build downloads a new launcher.
    pub fn staging_dir(&self) -> PathBuf {
        self.base_dir.join(STAGING_FOLDER)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}
