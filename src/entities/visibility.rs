//! VisibilitySet: which overlays are currently shown.
//!
//! Persisted to its own file (`lt-visible.json`), independent of the state
//! file, because the rendering page polls it directly. Writing it is the
//! whole cost of a show/hide: no recompile, no republish, no repoint.
//!
//! Wire format (read by the compiled script):
//! ```json
//! { "lt-3f2a...": true, "lt-9c01...": false }
//! ```
//! Absent ids are hidden.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, warn};

use super::overlay::OverlayId;
use crate::core::atomic::write_json_atomic;
use crate::core::error::{LtError, LtResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilitySet {
    // BTreeMap: stable key order so identical sets produce identical files
    map: BTreeMap<OverlayId, bool>,
}

impl VisibilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, id: &OverlayId) -> bool {
        self.map.get(id).copied().unwrap_or(false)
    }

    /// Raw entry, `None` when the id has never been toggled.
    pub fn entry(&self, id: &OverlayId) -> Option<bool> {
        self.map.get(id).copied()
    }

    pub fn set_visible(&mut self, id: &OverlayId, visible: bool) {
        self.map.insert(id.clone(), visible);
    }

    /// Flip and return the new state.
    pub fn toggle(&mut self, id: &OverlayId) -> bool {
        let next = !self.is_visible(id);
        self.set_visible(id, next);
        next
    }

    /// Show `id`, hide every other known id.
    pub fn show_exclusive<'a>(&mut self, id: &OverlayId, all: impl Iterator<Item = &'a OverlayId>) {
        for other in all {
            if other != id {
                self.map.insert(other.clone(), false);
            }
        }
        self.map.insert(id.clone(), true);
    }

    pub fn remove(&mut self, id: &OverlayId) -> Option<bool> {
        self.map.remove(id)
    }

    /// Drop entries whose id fails `keep`. Returns how many were dropped.
    pub fn retain_ids(&mut self, mut keep: impl FnMut(&OverlayId) -> bool) -> usize {
        let before = self.map.len();
        self.map.retain(|id, _| keep(id));
        before - self.map.len()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OverlayId, bool)> {
        self.map.iter().map(|(id, v)| (id, *v))
    }

    // === Persistence ===

    pub fn save(&self, path: &Path) -> LtResult<()> {
        write_json_atomic(path, &self.map)?;
        debug!("visibility: saved {} entr(ies) to {}", self.map.len(), path.display());
        Ok(())
    }

    pub fn try_load(path: &Path) -> LtResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(LtError::io(path, e)),
        };
        let map: BTreeMap<OverlayId, bool> =
            serde_json::from_str(&text).map_err(|e| LtError::malformed(path, e))?;
        Ok(Self { map })
    }

    /// Tolerant load: malformed content falls back to "everything hidden".
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            warn!("Starting with empty visibility set: {}", e);
            Self::new()
        })
    }
}
