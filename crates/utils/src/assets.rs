use std::path::PathBuf;

use thiserror::Error;

/// Environment variable that relocates the whole data directory.
pub const HOME_ENV: &str = "QUICKLAUNCH_HOME";

pub const CONFIG_FILE: &str = "config.json";
pub const COMMANDS_FILE: &str = "commands.json";
pub const VIEW_STATE_FILE: &str = "view-state.json";
pub const LOG_FILE: &str = "quicklaunch.log";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not determine home directory and {HOME_ENV} is not set")]
    NoHomeDir,
    #[error("failed to create data directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve the data directory without touching the filesystem.
pub fn resolve_asset_dir() -> Result<PathBuf, AssetError> {
    if let Some(custom) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(custom));
    }

    dirs::home_dir()
        .map(|home| home.join(".quicklaunch"))
        .ok_or(AssetError::NoHomeDir)
}

pub fn asset_dir() -> Result<PathBuf, AssetError> {
    let path = resolve_asset_dir()?;

    // Ensure the directory exists
    if !path.exists() {
        std::fs::create_dir_all(&path).map_err(|source| AssetError::CreateDir {
            path: path.clone(),
            source,
        })?;
    }

    Ok(path)
}

pub fn log_path() -> Result<PathBuf, AssetError> {
    Ok(asset_dir()?.join(LOG_FILE))
}
