//! Configuration management for Lab Coach

pub mod progress;
pub mod store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::theme::Theme;

pub use progress::LabRecord;
pub use store::{JsonFileStore, MemoryStore, ProgressStore};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Selected theme name
    pub theme: String,

    /// Show full solutions instead of skeletons everywhere
    pub always_show_solutions: bool,

    /// Identity attached to telemetry events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    /// Leaderboard service; telemetry only goes to the log when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard_url: Option<String>,

    /// Connection string handed to verify and cleanup collaborators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongo_uri: Option<String>,

    /// KMS alias removed when a step is reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_alias: Option<String>,

    /// AWS CLI profile used for cleanup
    pub aws_profile: String,

    /// Programs a lab may run to verify a step
    pub allowed_commands: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "Tokyo Night".to_string(),
            always_show_solutions: false,
            user_email: None,
            leaderboard_url: None,
            mongo_uri: None,
            kms_alias: None,
            aws_profile: "default".to_string(),
            allowed_commands: ["aws", "mongosh", "node", "npm"].map(String::from).to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "lab-coach").context("Failed to determine config directory")
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Directory holding per-lab progress files
    pub fn labs_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("labs"))
    }

    /// Log file used while the terminal UI owns the screen
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("lab-coach.log"))
    }

    /// Get the active theme
    pub fn active_theme(&self) -> Theme {
        Theme::by_name(&self.theme)
    }
}
