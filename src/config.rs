//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::{NavError, NavResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Saved VFS connections
    #[serde(default)]
    pub connections: Vec<SavedConnection>,
    /// File this configuration was loaded from
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// A saved VFS connection (password not stored for security)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConnection {
    /// Connection name, the `<connection>` part of `pvfs://<connection>/...`
    pub name: String,
    /// Backend kind: "sftp" or "memory"
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Username for SSH
    #[serde(default)]
    pub user: String,
    /// Hostname or IP address
    #[serde(default)]
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Remote directory exposed as the connection root
    #[serde(default = "default_root")]
    pub root: String,
    /// Private key for SSH; the agent is used when unset
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

fn default_kind() -> String {
    "sftp".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_root() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Save the last confirmed location and pre-select it next time
    pub remember_path: bool,
    /// Provider of the last confirmed location (auto-saved)
    pub last_provider: Option<String>,
    /// Path of the last confirmed location (auto-saved)
    pub last_path: Option<String>,
    /// Navigation history entries kept per session
    pub history_limit: usize,
    /// Entries kept by the recent-files provider
    pub recent_limit: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remember_path: true,
            last_provider: None,
            last_path: None,
            history_limit: 100,
            recent_limit: 20,
        }
    }
}

/// Get the config directory path for the current platform
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // Linux: ~/.config/burrow
        dirs_next().map(|p| p.join("burrow"))
    }

    #[cfg(target_os = "macos")]
    {
        // macOS: ~/.config/burrow, or ~/Library/Application Support/burrow if that already exists
        let home = std::env::var("HOME").ok().map(PathBuf::from);
        if let Some(ref h) = home {
            let xdg_path = h.join(".config/burrow");
            let legacy_path = h.join("Library/Application Support/burrow");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
            if legacy_path.exists() {
                return Some(legacy_path);
            }
        }
        home.map(|h| h.join(".config/burrow"))
    }

    #[cfg(target_os = "windows")]
    {
        // Windows: %APPDATA%\burrow
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("burrow"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config/burrow"))
    }
}

#[cfg(target_os = "linux")]
fn dirs_next() -> Option<PathBuf> {
    // Check XDG_CONFIG_HOME first, then fall back to ~/.config
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Get the recent-files store path
pub fn recents_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("recent.toml"))
}

/// Default config file content with comments
fn default_config() -> &'static str {
    r##"# Burrow Configuration
# This file is auto-generated. Edit as needed.

[general]
# Pre-select the last confirmed location when a new session opens
remember_path = true

# Number of back/forward entries kept while navigating
history_limit = 100

# Number of files kept by the "Recent" provider
recent_limit = 20

# VFS connections appear as pvfs://<name>/ under "VFS Connections".
# kind = "sftp" connects over SSH (agent auth unless key_file is set),
# kind = "memory" is a scratch in-process filesystem.
#
# [[connections]]
# name = "staging"
# kind = "sftp"
# user = "deploy"
# host = "files.example.com"
# port = 22
# root = "/srv/data"
# key_file = "/home/deploy/.ssh/id_ed25519"
"##
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            warn!("could not determine config directory");
            return Config::default();
        };
        Self::load_from(&config_path)
    }

    /// Load from an explicit path; any failure falls back to defaults
    pub fn load_from(config_path: &Path) -> Self {
        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
            && let Err(e) = fs::create_dir_all(config_dir)
        {
            warn!(error = %e, "could not create config directory");
            return Config::default();
        }

        if !config_path.exists()
            && let Err(e) = fs::write(config_path, default_config())
        {
            warn!(error = %e, "could not create config file");
            return Config::default();
        }

        match fs::read_to_string(config_path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => Config { source: Some(config_path.to_path_buf()), ..config },
                Err(e) => {
                    warn!(error = %e, "using default configuration");
                    Config::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "could not read config file");
                Config::default()
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> NavResult<Self> {
        toml_edit::de::from_str(content).map_err(|e| NavError::Config(e.to_string()))
    }

    /// Save configuration to the file it was loaded from, or the default file (preserving comments)
    pub fn save(&self) -> NavResult<()> {
        let config_path = match &self.source {
            Some(path) => path.clone(),
            None => config_file().ok_or_else(|| NavError::Config("Could not determine config path".to_string()))?,
        };
        self.save_to(&config_path)
    }

    /// File this configuration was loaded from, if it came from one
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Write back to the file this configuration was loaded from.
    /// Returns `false` for configurations that did not come from a file.
    pub fn persist(&self) -> NavResult<bool> {
        match &self.source {
            Some(path) => self.save_to(path).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn save_to(&self, config_path: &Path) -> NavResult<()> {
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir)?;
        }

        // Try to preserve comments by reading existing file and updating values
        let content = match fs::read_to_string(config_path) {
            Ok(existing) => self.update_toml_preserving_comments(&existing)?,
            Err(_) => toml_edit::ser::to_string_pretty(self).map_err(|e| NavError::Config(e.to_string()))?,
        };

        fs::write(config_path, content)?;
        Ok(())
    }

    /// Update TOML content while preserving comments and formatting
    fn update_toml_preserving_comments(&self, existing: &str) -> NavResult<String> {
        use toml_edit::{DocumentMut, value};

        let mut doc: DocumentMut = existing.parse().map_err(|e: toml_edit::TomlError| NavError::Config(e.to_string()))?;

        if doc.get("general").and_then(|v| v.as_table()).is_none() {
            doc.insert("general", toml_edit::table());
        }
        if let Some(general) = doc.get_mut("general").and_then(|v| v.as_table_mut()) {
            general["remember_path"] = value(self.general.remember_path);
            general["history_limit"] = value(self.general.history_limit as i64);
            general["recent_limit"] = value(self.general.recent_limit as i64);

            match &self.general.last_provider {
                Some(provider) => general["last_provider"] = value(provider.as_str()),
                None => {
                    general.remove("last_provider");
                }
            }
            match &self.general.last_path {
                Some(path) => general["last_path"] = value(path.as_str()),
                None => {
                    general.remove("last_path");
                }
            }
        }

        // Rebuild [[connections]]
        doc.remove("connections");
        if !self.connections.is_empty() {
            let mut aot = toml_edit::ArrayOfTables::new();
            for conn in &self.connections {
                let mut tbl = toml_edit::Table::new();
                tbl.insert("name", value(&conn.name));
                tbl.insert("kind", value(&conn.kind));
                tbl.insert("user", value(&conn.user));
                tbl.insert("host", value(&conn.host));
                tbl.insert("port", value(conn.port as i64));
                tbl.insert("root", value(&conn.root));
                if let Some(ref key) = conn.key_file {
                    tbl.insert("key_file", value(key.to_string_lossy().as_ref()));
                }
                aot.push(tbl);
            }
            doc.insert("connections", toml_edit::Item::ArrayOfTables(aot));
        }

        Ok(doc.to_string())
    }

    /// Remember the confirmed location when `remember_path` is on.
    /// Returns whether anything changed.
    pub fn remember_location(&mut self, provider: &str, path: &str) -> bool {
        if !self.general.remember_path {
            return false;
        }
        let changed = self.general.last_provider.as_deref() != Some(provider)
            || self.general.last_path.as_deref() != Some(path);
        self.general.last_provider = Some(provider.to_string());
        self.general.last_path = Some(path.to_string());
        changed
    }

    /// Add or replace a connection by name
    pub fn add_connection(&mut self, conn: SavedConnection) {
        if let Some(idx) = self.connections.iter().position(|c| c.name == conn.name) {
            self.connections[idx] = conn;
        } else {
            self.connections.push(conn);
        }
    }

    /// Remove a connection by name
    pub fn remove_connection(&mut self, name: &str) {
        self.connections.retain(|c| c.name != name);
    }
}
