//! OverlayStore: ordered collection of overlay definitions.
//!
//! Insertion order is display order AND stacking order in the compiled
//! artifact; nothing here reorders implicitly. The store is also the unit of
//! serialization: `lt-state.json` is saved and loaded via
//! [`OverlayStore::save`] / [`OverlayStore::load`].

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::overlay::{Overlay, OverlayId, is_relative_asset_name};
use crate::core::atomic::write_json_atomic;
use crate::core::error::{LtError, LtResult};

const STATE_VERSION: u32 = 1;

/// On-disk shape of the state file.
#[derive(Serialize)]
struct StateFileRef<'a> {
    version: u32,
    items: Vec<&'a Overlay>,
}

#[derive(Deserialize)]
struct StateFile {
    #[serde(default)]
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    items: Vec<Overlay>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayStore {
    items: IndexMap<OverlayId, Overlay>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &OverlayId) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &OverlayId) -> LtResult<&Overlay> {
        self.items.get(id).ok_or_else(|| LtError::NotFound(id.clone()))
    }

    /// All overlays in display order.
    pub fn all(&self) -> impl Iterator<Item = &Overlay> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &OverlayId> {
        self.items.keys()
    }

    pub fn position_of(&self, id: &OverlayId) -> Option<usize> {
        self.items.get_index_of(id)
    }

    /// Fresh id that is not in the store. UUID collisions are not a
    /// practical concern, but the loop keeps the uniqueness invariant local.
    fn allocate_id(&self) -> OverlayId {
        loop {
            let id = OverlayId::generate();
            if !self.items.contains_key(&id) {
                return id;
            }
        }
    }

    /// Append an overlay with default content.
    pub fn add(&mut self) -> OverlayId {
        let id = self.allocate_id();
        self.items.insert(id.clone(), Overlay::new(id.clone()));
        debug!("store: added {}", id);
        id
    }

    /// Duplicate `source` under a new id, directly after it.
    pub fn clone_overlay(&mut self, source: &OverlayId) -> LtResult<OverlayId> {
        let index = self
            .items
            .get_index_of(source)
            .ok_or_else(|| LtError::NotFound(source.clone()))?;
        let id = self.allocate_id();
        let copy = self.items[index].duplicate(id.clone());
        self.items.shift_insert(index + 1, id.clone(), copy);
        debug!("store: cloned {} -> {}", source, id);
        Ok(id)
    }

    /// Remove and return the overlay. Order of the rest is preserved.
    pub fn remove(&mut self, id: &OverlayId) -> LtResult<Overlay> {
        self.items
            .shift_remove(id)
            .ok_or_else(|| LtError::NotFound(id.clone()))
    }

    /// Replace the content of an existing overlay in place (position kept).
    pub fn replace(&mut self, overlay: Overlay) -> LtResult<()> {
        let slot = self
            .items
            .get_mut(&overlay.id)
            .ok_or_else(|| LtError::NotFound(overlay.id.clone()))?;
        *slot = overlay;
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, id: &OverlayId) -> LtResult<&mut Overlay> {
        self.items
            .get_mut(id)
            .ok_or_else(|| LtError::NotFound(id.clone()))
    }

    // === Persistence ===

    /// Serialize the whole store atomically.
    pub fn save(&self, path: &Path) -> LtResult<()> {
        let file = StateFileRef {
            version: STATE_VERSION,
            items: self.items.values().collect(),
        };
        write_json_atomic(path, &file)?;
        debug!("store: saved {} overlay(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Strict load: missing file is an empty store, anything else unreadable
    /// is an error.
    pub fn try_load(path: &Path) -> LtResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(LtError::io(path, e)),
        };
        let file: StateFile =
            serde_json::from_str(&text).map_err(|e| LtError::malformed(path, e))?;
        Ok(Self::from_items(file.items))
    }

    /// Tolerant load used at startup: a corrupt or unreadable state file
    /// yields an empty store instead of blocking the editor.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => {
                info!("Loaded {} overlay(s) from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                warn!("Starting with empty overlay list: {}", e);
                Self::new()
            }
        }
    }

    /// Build from a loaded list, repairing what would break invariants:
    /// invalid or duplicate ids get fresh ones, unsafe image paths are dropped.
    fn from_items(items: Vec<Overlay>) -> Self {
        let mut store = Self::new();
        let mut seen = HashSet::new();
        for mut overlay in items {
            if !overlay.id.is_valid() || !seen.insert(overlay.id.clone()) {
                let fresh = store.allocate_id();
                warn!("Overlay id {:?} invalid or duplicated, reassigned {}", overlay.id.as_str(), fresh);
                seen.insert(fresh.clone());
                overlay.id = fresh;
            }
            let unsafe_pic = overlay
                .profile_picture
                .as_deref()
                .is_some_and(|pic| !is_relative_asset_name(pic));
            if unsafe_pic {
                warn!(
                    "Overlay {}: dropping profile image outside output dir: {:?}",
                    overlay.id, overlay.profile_picture
                );
                overlay.profile_picture = None;
            }
            store.items.insert(overlay.id.clone(), overlay);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atomic::tests::temp_dir;
    use crate::entities::overlay::AnimSelector;

    #[test]
    fn add_appends_in_order_with_distinct_ids() {
        let mut store = OverlayStore::new();
        let ids: Vec<_> = (0..50).map(|_| store.add()).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 50);
        let order: Vec<_> = store.ids().cloned().collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn clone_inserts_right_after_source() {
        let mut store = OverlayStore::new();
        let a = store.add();
        let c = store.add();
        let b = store.clone_overlay(&a).unwrap();
        let order: Vec<_> = store.ids().cloned().collect();
        assert_eq!(order, vec![a.clone(), b.clone(), c]);
        assert_ne!(a, b);
        assert_eq!(store.get(&b).unwrap().title, store.get(&a).unwrap().title);
    }

    #[test]
    fn remove_and_missing_ids_report_not_found() {
        let mut store = OverlayStore::new();
        let a = store.add();
        store.remove(&a).unwrap();
        assert!(matches!(store.remove(&a), Err(LtError::NotFound(_))));
        assert!(matches!(store.get(&a), Err(LtError::NotFound(_))));
        assert!(matches!(store.clone_overlay(&a), Err(LtError::NotFound(_))));
    }

    #[test]
    fn replace_keeps_position() {
        let mut store = OverlayStore::new();
        let a = store.add();
        let b = store.add();
        let mut edited = store.get(&a).unwrap().clone();
        edited.title = "Edited".into();
        store.replace(edited).unwrap();
        assert_eq!(store.position_of(&a), Some(0));
        assert_eq!(store.position_of(&b), Some(1));
        assert_eq!(store.get(&a).unwrap().title, "Edited");
    }

    #[test]
    fn save_load_round_trip() {
        let dir = temp_dir("store_round_trip");
        let path = dir.join("lt-state.json");

        let mut store = OverlayStore::new();
        let a = store.add();
        store.add();
        {
            let o = store.get_mut(&a).unwrap();
            o.title = "Guest".into();
            o.anim_in = AnimSelector::custom("myIn");
            o.profile_picture = Some("lt-a_1.png".into());
            o.hotkey = Some("Ctrl+Shift+1".into());
            o.js_template = "root.dataset.x = 1;".into();
            o.repeat_every_sec = 30;
            o.repeat_visible_sec = 8;
        }
        store.save(&path).unwrap();
        let loaded = OverlayStore::try_load(&path).unwrap();
        assert_eq!(loaded, store);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tolerant_load_recovers_from_garbage() {
        let dir = temp_dir("store_garbage");
        let path = dir.join("lt-state.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(OverlayStore::try_load(&path), Err(LtError::Malformed { .. })));
        assert!(OverlayStore::load(&path).is_empty());

        // Missing file and missing directory are both just empty
        assert!(OverlayStore::load(&dir.join("absent.json")).is_empty());
        assert!(OverlayStore::load(&dir.join("no/such/dir/lt-state.json")).is_empty());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_repairs_bad_ids_and_paths() {
        let dir = temp_dir("store_repair");
        let path = dir.join("lt-state.json");
        let json = r#"{"version":1,"items":[
            {"id":"lt-a","title":"A"},
            {"id":"lt-a","title":"dup"},
            {"id":"\"><b>","title":"bad"},
            {"id":"lt-c","title":"C","profile_picture":"../../etc/passwd"}
        ]}"#;
        fs::write(&path, json).unwrap();
        let store = OverlayStore::try_load(&path).unwrap();
        assert_eq!(store.len(), 4);
        assert!(store.ids().all(|id| id.is_valid()));
        let unique: HashSet<_> = store.ids().collect();
        assert_eq!(unique.len(), 4);
        let titles: Vec<_> = store.all().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "dup", "bad", "C"]);
        assert_eq!(store.get(&OverlayId::from("lt-c")).unwrap().profile_picture, None);
        fs::remove_dir_all(&dir).ok();
    }
}
