use directories::ProjectDirs;
use std::path::PathBuf;

/// Platform data directory for RecallKit, or the working directory when the
/// platform has none.
pub fn data_root() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("org", "recallkit", "RecallKit") {
        pd.data_dir().to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Default location of the CLI's optional JSON config file.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("org", "recallkit", "RecallKit").map(|pd| pd.config_dir().join("config.json"))
}
