//! Application configuration for clipdesk.
//!
//! User config lives at `~/.clipdesk/clipdesk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClipdeskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "clipdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".clipdesk";

// ---------------------------------------------------------------------------
// Config structs (matching clipdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registered curation instances.
    #[serde(default)]
    pub instances: Vec<CurationInstance>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for the checkpoint store.
    #[serde(default = "default_checkpoint_root")]
    pub checkpoint_root: String,

    /// Body paragraphs kept per article in the trimmed report.
    #[serde(default = "default_keep_body_paras")]
    pub keep_body_paras: usize,

    /// Fixed UTC offset (hours) used to compute the checkpoint partition
    /// date — one deployment, one time zone.
    #[serde(default = "default_tz_offset_hours")]
    pub tz_offset_hours: i32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            checkpoint_root: default_checkpoint_root(),
            keep_body_paras: default_keep_body_paras(),
            tz_offset_hours: default_tz_offset_hours(),
        }
    }
}

fn default_checkpoint_root() -> String {
    "~/clipdesk-data".into()
}
fn default_keep_body_paras() -> usize {
    3
}
fn default_tz_offset_hours() -> i32 {
    8
}

/// `[[instances]]` entry — one workflow configuration.
///
/// Each instance is an explicit value object: category label, checkpoint
/// base folder, report title, and the portal query used during preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationInstance {
    /// Instance name used on the command line.
    pub name: String,
    /// Category label the instance curates into.
    pub category: String,
    /// Checkpoint base folder for this instance.
    pub base_folder: String,
    /// Title of the generated report.
    pub report_title: String,
    /// Portal search query used for preview and bulk retrieval.
    pub query: String,
}

impl AppConfig {
    /// Look up a registered instance by name.
    pub fn find_instance(&self, name: &str) -> Result<&CurationInstance> {
        self.instances
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| {
                ClipdeskError::config(format!(
                    "no instance named '{name}' in {CONFIG_FILE_NAME}"
                ))
            })
    }

    /// Checkpoint root with a leading `~` expanded to the home directory.
    pub fn resolved_checkpoint_root(&self) -> Result<PathBuf> {
        let raw = &self.defaults.checkpoint_root;
        if let Some(rest) = raw.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                ClipdeskError::config("could not determine home directory")
            })?;
            return Ok(home.join(rest));
        }
        Ok(PathBuf::from(raw))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.clipdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClipdeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.clipdesk/clipdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClipdeskError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ClipdeskError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClipdeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClipdeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClipdeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("checkpoint_root"));
        assert!(toml_str.contains("keep_body_paras"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.keep_body_paras, 3);
        assert_eq!(parsed.defaults.tz_offset_hours, 8);
    }

    #[test]
    fn config_with_instances() {
        let toml_str = r#"
[defaults]
checkpoint_root = "/tmp/clipdesk"

[[instances]]
name = "daily"
category = "本地"
base_folder = "daily-clips"
report_title = "Daily News Selection"
query = "smart city OR 智慧城市"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.instances.len(), 1);
        assert_eq!(config.find_instance("daily").unwrap().category, "本地");
        assert!(config.find_instance("weekly").is_err());
    }

    #[test]
    fn checkpoint_root_without_tilde_is_literal() {
        let mut config = AppConfig::default();
        config.defaults.checkpoint_root = "/var/clipdesk".into();
        assert_eq!(
            config.resolved_checkpoint_root().unwrap(),
            PathBuf::from("/var/clipdesk")
        );
    }
}
