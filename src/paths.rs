//! XDG directory helpers for config and log locations.

use std::path::PathBuf;

/// Base directory for persistent data (logs).
///
/// Uses `ARBOLADO_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/arbolado` or
/// `~/.local/share/arbolado`.
pub(crate) fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARBOLADO_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("arbolado")
}

/// Default directory for rolling log files.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Base directory for configuration files.
///
/// Uses `ARBOLADO_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/arbolado`
/// or `~/.config/arbolado`.
pub(crate) fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARBOLADO_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("arbolado")
}
