//! Render surface capability: the host-owned browser source.
//!
//! The source lives in the host's scene graph, not here. The pipeline may only
//! ask for two things: make sure it exists, and point it at a file. Nothing
//! destroys or recreates it, since that would interrupt a live broadcast.
//!
//! - [`MemorySurface`] - in-process stand-in (embedding, tests)
//! - [`SceneFileSurface`] - JSON scene description on disk, used by the CLI

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::atomic::write_json_atomic;
use super::error::{LtError, LtResult};
use crate::entities::keys::{SOURCE_HEIGHT, SOURCE_KIND, SOURCE_NAME, SOURCE_WIDTH};

/// Capability interface over the externally-owned rendering resource.
pub trait RenderSurface {
    /// Create the managed source if it is absent. Idempotent.
    /// Returns true when a source was created by this call.
    fn ensure_exists(&mut self) -> LtResult<bool>;

    /// Point the managed source at `path` without recreating it.
    /// Returns true when the setting actually changed.
    fn repoint(&mut self, path: &Path) -> LtResult<bool>;
}

impl<T: RenderSurface + ?Sized> RenderSurface for Box<T> {
    fn ensure_exists(&mut self) -> LtResult<bool> {
        (**self).ensure_exists()
    }

    fn repoint(&mut self, path: &Path) -> LtResult<bool> {
        (**self).repoint(path)
    }
}

/// One browser source as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub name: String,
    pub kind: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<PathBuf>,
}

impl SourceRecord {
    fn managed_default() -> Self {
        Self {
            name: SOURCE_NAME.to_string(),
            kind: SOURCE_KIND.to_string(),
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
            local_file: None,
        }
    }

    fn is_managed(&self) -> bool {
        self.name == SOURCE_NAME && self.kind == SOURCE_KIND
    }
}

/// Shared ensure/repoint logic over a source list.
fn ensure_in(sources: &mut Vec<SourceRecord>) -> bool {
    if sources.iter().any(SourceRecord::is_managed) {
        return false;
    }
    sources.push(SourceRecord::managed_default());
    true
}

fn repoint_in(sources: &mut [SourceRecord], path: &Path) -> bool {
    let mut changed = false;
    for src in sources.iter_mut().filter(|s| s.is_managed()) {
        if src.local_file.as_deref() != Some(path) {
            src.local_file = Some(path.to_path_buf());
            changed = true;
        }
    }
    changed
}

// === In-memory ===

#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    pub sources: Vec<SourceRecord>,
    /// Number of repoints that changed the source setting
    pub repoints: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn managed_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_managed()).count()
    }

    pub fn local_file(&self) -> Option<&Path> {
        self.sources
            .iter()
            .find(|s| s.is_managed())
            .and_then(|s| s.local_file.as_deref())
    }
}

impl RenderSurface for MemorySurface {
    fn ensure_exists(&mut self) -> LtResult<bool> {
        Ok(ensure_in(&mut self.sources))
    }

    fn repoint(&mut self, path: &Path) -> LtResult<bool> {
        let changed = repoint_in(&mut self.sources, path);
        if changed {
            self.repoints += 1;
        }
        Ok(changed)
    }
}

// === Scene file ===

#[derive(Debug, Default, Serialize, Deserialize)]
struct SceneFile {
    #[serde(default)]
    sources: Vec<SourceRecord>,
}

/// Scene description stored as JSON. Stands in for the host's scene graph
/// when the pipeline runs headless.
#[derive(Debug, Clone)]
pub struct SceneFileSurface {
    path: PathBuf,
}

impl SceneFileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> LtResult<SceneFile> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| LtError::malformed(&self.path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SceneFile::default()),
            Err(e) => Err(LtError::io(&self.path, e)),
        }
    }

    /// Managed sources currently recorded in the scene file.
    pub fn sources(&self) -> LtResult<Vec<SourceRecord>> {
        Ok(self.read()?.sources)
    }
}

impl RenderSurface for SceneFileSurface {
    fn ensure_exists(&mut self) -> LtResult<bool> {
        let mut scene = self.read()?;
        if !ensure_in(&mut scene.sources) {
            debug!("surface: '{}' already present", SOURCE_NAME);
            return Ok(false);
        }
        write_json_atomic(&self.path, &scene)?;
        info!(
            "Created browser source '{}' ({}x{}) in {}",
            SOURCE_NAME,
            SOURCE_WIDTH,
            SOURCE_HEIGHT,
            self.path.display()
        );
        Ok(true)
    }

    fn repoint(&mut self, path: &Path) -> LtResult<bool> {
        let mut scene = self.read()?;
        if !scene.sources.iter().any(SourceRecord::is_managed) {
            warn!("surface: no '{}' source to repoint", SOURCE_NAME);
            return Ok(false);
        }
        if !repoint_in(&mut scene.sources, path) {
            return Ok(false);
        }
        write_json_atomic(&self.path, &scene)?;
        info!("Browser source now points at {}", path.display());
        Ok(true)
    }
}
