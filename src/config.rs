//! Process-wide configuration record.
//!
//! Only the output directory lives here. Everything else (overlays,
//! visibility, artifacts) is stored under that directory, so pointing the
//! pipeline at a different folder switches the whole working set.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::atomic::write_json_atomic;
use crate::core::error::{LtError, LtResult};

pub use crate::paths::{CONFIG_DIR_ENV, PathConfig, config_file, data_file, ensure_dirs};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Unset until the operator picks a folder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Missing or malformed record yields the default (unconfigured).
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("config: {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Cannot read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> LtResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LtError::io(parent, e))?;
        }
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atomic::tests::temp_dir;

    #[test]
    fn round_trip() {
        let dir = temp_dir("config_round_trip");
        let path = dir.join("nested").join("lower-thirds.json");
        let cfg = AppConfig { output_dir: Some(PathBuf::from("/srv/overlays")) };
        cfg.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path), cfg);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_and_malformed_are_unconfigured() {
        let dir = temp_dir("config_bad");
        let path = dir.join("lower-thirds.json");
        assert_eq!(AppConfig::load(&path).output_dir, None);
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(AppConfig::load(&path).output_dir, None);
        fs::remove_dir_all(&dir).ok();
    }
}
