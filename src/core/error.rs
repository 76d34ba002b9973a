//! Error taxonomy for the rebuild pipeline.
//!
//! Every failure here is recoverable: callers get an `LtError` back and the
//! on-disk state is whatever the last successful atomic write left behind.

use std::path::{Path, PathBuf};

use crate::entities::OverlayId;

pub type LtResult<T> = Result<T, LtError>;

#[derive(thiserror::Error, Debug)]
pub enum LtError {
    /// No output directory configured yet
    #[error("output directory is not configured")]
    NotConfigured,

    #[error("overlay not found: {0}")]
    NotFound(OverlayId),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid output directory: {0}")]
    InvalidOutputDir(String),

    #[error("invalid profile image: {0}")]
    InvalidProfileImage(String),

    #[error("render surface error: {0}")]
    Surface(String),
}

impl LtError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn malformed(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_output_dir(msg: impl Into<String>) -> Self {
        Self::InvalidOutputDir(msg.into())
    }

    pub fn invalid_profile_image(msg: impl Into<String>) -> Self {
        Self::InvalidProfileImage(msg.into())
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    /// True for the "nothing to do, fix config first" case.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }
}
