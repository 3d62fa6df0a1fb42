use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the NL-to-SQL backend
    pub backend_url: String,

    /// Color theme ("dark" or "light")
    pub theme: String,

    /// Sqlpilot home directory
    pub sqlpilot_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Whether the schema panel starts visible
    pub show_schema_panel: bool,

    /// Maximum number of chat turns kept on screen
    pub max_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let sqlpilot_home = home.join(".sqlpilot");

        Config {
            backend_url: "http://127.0.0.1:8000".to_string(),
            theme: "dark".to_string(),
            sqlpilot_home,
            ui: UiConfig {
                show_schema_panel: true,
                max_history: 200,
            },
        }
    }
}

impl Config {
    /// Load configuration from file, creating the home directory if needed
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let sqlpilot_home = home.join(".sqlpilot");
        let config_path = sqlpilot_home.join("config.toml");

        fs::create_dir_all(&sqlpilot_home)
            .context("Failed to create .sqlpilot directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.sqlpilot_home = sqlpilot_home;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.sqlpilot_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Path of the persisted chat history
    pub fn history_path(&self) -> PathBuf {
        self.sqlpilot_home.join("chat_history.json")
    }

    /// Path of the local schema fallback, written only when a backend save fails
    pub fn schema_fallback_path(&self) -> PathBuf {
        self.sqlpilot_home.join("sql_schema.json")
    }

    /// Path of the log file
    pub fn log_path(&self) -> PathBuf {
        self.sqlpilot_home.join("sqlpilot.log")
    }

    /// Toggle between dark and light theme, returning the new value
    pub fn toggle_theme(&mut self) -> &str {
        self.theme = if self.theme == "dark" {
            "light".to_string()
        } else {
            "dark".to_string()
        };
        &self.theme
    }

    #[allow(dead_code)]
    pub fn is_dark(&self) -> bool {
        self.theme != "light"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_backend() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://127.0.0.1:8000");
        assert_eq!(config.theme, "dark");
    }

    #[test]
    fn toggle_theme_flips_between_dark_and_light() {
        let mut config = Config::default();
        assert_eq!(config.toggle_theme(), "light");
        assert!(!config.is_dark());
        assert_eq!(config.toggle_theme(), "dark");
        assert!(config.is_dark());
    }
}
