use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// telegram_token = "123456:ABC..."
/// openweather_api_key = "..."
/// gemini_api_key = "..."          # optional, advice degrades without it
/// # subscriptions_file = "/var/lib/weatherbot/subscriptions.json"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub openweather_api_key: Option<String>,

    /// Optional; when absent the advice generator runs in its disabled
    /// variant and every report carries a placeholder instead.
    pub gemini_api_key: Option<String>,

    /// Override for the subscription store location. Defaults to the
    /// platform data directory.
    pub subscriptions_file: Option<PathBuf>,
}

impl Config {
    pub fn telegram_token(&self) -> Result<&str> {
        self.telegram_token.as_deref().ok_or_else(|| {
            anyhow!(
                "No Telegram bot token configured.\n\
                 Hint: run `weatherbot configure` first."
            )
        })
    }

    /// Path of the durable subscription store.
    pub fn subscriptions_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.subscriptions_file {
            return Ok(path.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("subscriptions.json"))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weatherbot", "weatherbot")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_token_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.telegram_token().unwrap_err();
        assert!(err.to_string().contains("No Telegram bot token configured"));
    }

    #[test]
    fn telegram_token_returns_configured_value() {
        let cfg = Config { telegram_token: Some("123:ABC".into()), ..Config::default() };
        assert_eq!(cfg.telegram_token().expect("token must exist"), "123:ABC");
    }

    #[test]
    fn subscriptions_path_prefers_override() {
        let cfg = Config {
            subscriptions_file: Some(PathBuf::from("/tmp/subs.json")),
            ..Config::default()
        };
        let path = cfg.subscriptions_path().expect("path");
        assert_eq!(path, PathBuf::from("/tmp/subs.json"));
    }

    #[test]
    fn subscriptions_path_defaults_to_data_dir() {
        let cfg = Config::default();
        let path = cfg.subscriptions_path().expect("path");
        assert!(path.ends_with("subscriptions.json"));
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let cfg = Config {
            telegram_token: Some("123:ABC".into()),
            openweather_api_key: Some("OW_KEY".into()),
            gemini_api_key: None,
            subscriptions_file: None,
        };
        let toml = toml::to_string_pretty(&cfg).expect("serialize");
        let back: Config = toml::from_str(&toml).expect("parse");
        assert_eq!(back.telegram_token.as_deref(), Some("123:ABC"));
        assert_eq!(back.openweather_api_key.as_deref(), Some("OW_KEY"));
        assert!(back.gemini_api_key.is_none());
    }
}
