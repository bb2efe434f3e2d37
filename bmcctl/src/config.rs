//! Configuration management for bmcctl.
//!
//! Configuration comes from a TOML file, then environment variables, then
//! command-line flags, each layer overriding the previous one. The file is
//! taken from an explicit path or `$BMCCTL_CONFIG`; without either, the
//! built-in defaults apply.
//!
//! ```toml
//! [bmc]
//! host = "10.0.0.42"
//! username = "ADMIN"
//! password = "secret"
//! interface = "lanplus"
//!
//! [pmbus]
//! bus = 7
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "BMCCTL_CONFIG";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// BMC connection settings
    pub bmc: BmcConfig,

    /// PMBus access settings
    pub pmbus: PmbusConfig,
}

/// BMC connection settings, handed to the transport.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BmcConfig {
    /// BMC hostname or address
    pub host: Option<String>,

    /// RMCP port, if not the default 623
    pub port: Option<u16>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// ipmitool interface name (lan, lanplus, open, ...)
    pub interface: String,

    /// Path to the ipmitool executable
    pub ipmitool: PathBuf,
}

impl Default for BmcConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            interface: "lanplus".to_string(),
            ipmitool: PathBuf::from("ipmitool"),
        }
    }
}

/// PMBus access settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PmbusConfig {
    /// BMC bus identifier the power supplies hang off
    pub bus: u8,
}

impl Default for PmbusConfig {
    fn default() -> Self {
        Self { bus: 0x07 }
    }
}

impl Config {
    /// Load configuration from `path`, or from `$BMCCTL_CONFIG`, or fall back
    /// to defaults. Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::load_from(&path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::parse(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply `BMCCTL_HOST`, `BMCCTL_USER` and `BMCCTL_PASSWORD`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BMCCTL_HOST") {
            self.bmc.host = Some(host);
        }
        if let Some(user) = lookup("BMCCTL_USER") {
            self.bmc.username = Some(user);
        }
        if let Some(password) = lookup("BMCCTL_PASSWORD") {
            self.bmc.password = Some(password);
        }
    }
}
