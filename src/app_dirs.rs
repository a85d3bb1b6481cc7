use directories::ProjectDirs;
use std::path::PathBuf;

pub const STATE_DIR_ENV: &str = "SETWISE_STATE_DIR";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$SETWISE_STATE_DIR`, else `$HOME/.local/state/setwise`, else the
    /// platform data-local dir
    pub fn state_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("setwise"),
            )
        } else {
            ProjectDirs::from("", "", "setwise").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn progress_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("progress.json"))
    }

    pub fn history_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("history.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("setwise.log"))
    }

    /// Config lives next to the state when the state dir is overridden, so
    /// tests and sandboxes never touch the real config
    pub fn config_path() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        ProjectDirs::from("", "", "setwise").map(|pd| pd.config_dir().join("config.json"))
    }
}
