use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application path resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("typr"),
            )
        } else {
            ProjectDirs::from("", "", "typr")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn quote_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("quotes.db"))
    }

    pub fn session_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.csv"))
    }

    pub fn trace_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("typr.log"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "typr")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
    }
}
