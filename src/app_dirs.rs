use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Default location of the profile store document.
    pub fn profile_store_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let config_dir = PathBuf::from(home).join(".config").join("wpmbot");
            Some(config_dir.join("profiles.yaml"))
        } else {
            ProjectDirs::from("", "", "wpmbot")
                .map(|proj_dirs| proj_dirs.config_dir().join("profiles.yaml"))
        }
    }
}
