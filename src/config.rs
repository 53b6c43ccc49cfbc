use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the mission workflow
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Workflow rule switches
    pub workflow: WorkflowSettings,
    /// Event bus settings
    pub events: EventsConfig,
    /// Input size limits
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive, overridden by RUST_LOG when set
    pub log_level: String,
    /// Emit JSON lines instead of human readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Judges may only act on a step once every earlier step is approved
    pub enforce_step_order: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffer size of the broadcast tap for external observers
    pub tap_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_title_len: usize,
    pub max_description_len: usize,
    pub max_chat_len: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            enforce_step_order: true,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { tap_capacity: 256 }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_title_len: 200,
            max_description_len: 2000,
            max_chat_len: 2000,
        }
    }
}

pub const CONFIG_FILE: &str = "mission-workflow.toml";
pub const ENV_PREFIX: &str = "MISSION_WORKFLOW";

impl WorkflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. mission-workflow.toml in the working directory
    /// 3. Environment variables (prefixed with MISSION_WORKFLOW__)
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        Self::load_layers(path.exists().then_some(path))
    }

    /// Same precedence as [`WorkflowConfig::load`] with an explicit file that must exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layers(Some(path.as_ref()))
    }

    fn load_layers(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<WorkflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = WorkflowConfig::load_env_file();
        WorkflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WorkflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert!(config.workflow.enforce_step_order);
        assert_eq!(config.limits.max_title_len, 200);
        assert_eq!(config.events.tap_capacity, 256);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_file_overrides_defaults_partially() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[workflow]\nenforce_step_order = false\n\n[limits]\nmax_chat_len = 500"
        )
        .unwrap();

        let config = WorkflowConfig::load_from(file.path()).unwrap();

        assert!(!config.workflow.enforce_step_order);
        assert_eq!(config.limits.max_chat_len, 500);
        assert_eq!(config.limits.max_title_len, 200);
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = WorkflowConfig::default();
        config.observability.log_level = "debug".to_string();
        config.events.tap_capacity = 16;

        config.save_to_file(&path).unwrap();
        let reloaded = WorkflowConfig::load_from(&path).unwrap();

        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WorkflowConfig::load_from(dir.path().join("absent.toml")).is_err());
    }
}
