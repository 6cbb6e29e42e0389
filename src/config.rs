use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifacts::DEFAULT_ARTIFACTS_DIR;
use crate::browser::DEFAULT_NAVIGATION_TIMEOUT;
use crate::compare::capture::{DEFAULT_CAPTURE_GRACE, MAX_AFTER_CAPTURES};
use crate::storage::DEFAULT_DATABASE_FILE;
use crate::{GuardError, Result, Viewport};

/// Defaults for the CLI, read from TOML. Every key is optional.
///
/// ```toml
/// delays = [1000, 3000]
/// artifacts_dir = "/var/tmp/pageguard"
///
/// [viewport]
/// width = 1280
/// height = 720
///
/// [timeouts]
/// navigation = "45s"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub viewport: Viewport,
    pub delays: Vec<i64>,
    pub artifacts_dir: PathBuf,
    pub database: PathBuf,
    /// Render the highlighted screenshot when elements go missing.
    pub overlay: bool,
    /// Cap on the stored full HTML, in characters.
    pub html_limit: Option<usize>,
    pub browser: BrowserConfig,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub node_command: String,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    /// Extra time on top of navigation + settle delay before a capture is abandoned.
    #[serde(with = "humantime_serde")]
    pub capture_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
            capture_grace: DEFAULT_CAPTURE_GRACE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            delays: Vec::new(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
            overlay: true,
            html_limit: None,
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// `~/.config/pageguard/config.toml`, when a home directory is known.
    pub fn central_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("pageguard")
                    .join("config.toml")
            })
    }

    /// Loads `path`, else the central config if it exists, else defaults.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path().filter(|p| p.is_file()) {
                Some(central) => Self::from_file(&central),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GuardError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| GuardError::Config(format!("Invalid config ({}): {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.viewport.is_renderable() {
            return Err(GuardError::Config(format!(
                "viewport must be positive, got {}",
                self.viewport
            )));
        }
        if self.delays.len() > MAX_AFTER_CAPTURES {
            return Err(GuardError::Config(format!(
                "at most {} delays are supported, got {}",
                MAX_AFTER_CAPTURES,
                self.delays.len()
            )));
        }
        if let Some(bad) = self.delays.iter().find(|d| **d <= 0) {
            return Err(GuardError::Config(format!(
                "delays must be positive milliseconds, got {bad}"
            )));
        }
        if self.timeouts.navigation.is_zero() {
            return Err(GuardError::Config(
                "timeouts.navigation must be greater than zero".to_string(),
            ));
        }
        if self.browser.node_command.trim().is_empty() {
            return Err(GuardError::Config(
                "browser.node_command must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
