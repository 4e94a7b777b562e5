//! User settings from `<asset_dir>/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::external::DispatchOptions;
use crate::state::Notice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Overrides `<asset_dir>/commands.json`; relative paths resolve against
    /// the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_terminal_profile: Option<String>,
    #[serde(default = "default_url_open_delay_ms")]
    pub url_open_delay_ms: u64,
    /// Program used for URLs marked `external: false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_browser: Option<String>,
}

fn default_url_open_delay_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands_file: None,
            default_terminal_profile: None,
            url_open_delay_ms: default_url_open_delay_ms(),
            embedded_browser: None,
        }
    }
}

impl Config {
    /// Load from `path`. Missing file gives defaults; an unreadable or
    /// malformed one gives defaults plus a warning.
    pub fn load(path: &Path) -> (Self, Option<Notice>) {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return (Self::default(), None);
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Config>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                (config, None)
            }
            Err(e) => {
                tracing::warn!("Failed to load config {:?}: {}", path, e);
                (
                    Self::default(),
                    Some(Notice::warning(format!("Config ignored, using defaults: {}", e))),
                )
            }
        }
    }

    /// Where the command document lives.
    pub fn commands_path(&self, asset_dir: &Path) -> PathBuf {
        match &self.commands_file {
            Some(file) if file.is_absolute() => file.clone(),
            Some(file) => asset_dir.join(file),
            None => asset_dir.join(utils::assets::COMMANDS_FILE),
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            url_delay: Duration::from_millis(self.url_open_delay_ms),
            default_profile: self.default_terminal_profile.clone(),
            embedded_browser: self.embedded_browser.clone(),
            ..DispatchOptions::default()
        }
    }
}
