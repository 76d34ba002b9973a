//! Rebuild coordinator: one context object per output directory session.
//!
//! Owns the store, the visibility set, the publisher and the render surface,
//! and decides per operation how much work to do:
//!
//! | Operation                         | state | visibility | publish | repoint |
//! |-----------------------------------|-------|------------|---------|---------|
//! | add / clone / remove              | write | remove     | yes     | yes     |
//! | save / import_profile_image       | write | -          | yes     | yes     |
//! | toggle / set_visible / show_only  | -     | write      | no      | no      |
//! | set_output_dir                    | write | write      | yes     | yes     |
//! | ensure_source                     | -     | -          | once    | yes     |
//!
//! `ensure_source` only publishes when the directory has no revision yet.
//!
//! Failure policy:
//! - a failed state/visibility write rolls the in-memory change back
//! - a failed publish restores the previous store in memory and on disk;
//!   the previous revision stays current and the surface is untouched
//! - a failed repoint after a good publish keeps the new state and revision

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};

use super::compiler::compile;
use super::error::{LtError, LtResult};
use super::events::{CoreEvent, EventBus};
use super::publisher::Publisher;
use super::surface::RenderSurface;
use crate::config::AppConfig;
use crate::entities::keys::{STATE_FILE, VISIBLE_FILE};
use crate::entities::overlay::is_relative_asset_name;
use crate::entities::{Overlay, OverlayId, OverlayStore, VisibilitySet};
use crate::server::{ApiCommand, SharedApiState};

pub struct Coordinator<S: RenderSurface> {
    config: AppConfig,
    config_path: PathBuf,
    store: OverlayStore,
    visibility: VisibilitySet,
    publisher: Publisher,
    surface: S,
    events: EventBus,
    api_state: Option<Arc<SharedApiState>>,
}

impl<S: RenderSurface> Coordinator<S> {
    /// Load the config record and, when an output directory is set, the
    /// overlays and visibility stored there. Never fails: unreadable files
    /// degrade to empty state and are logged.
    pub fn open(config_path: impl Into<PathBuf>, surface: S) -> Self {
        let config_path = config_path.into();
        let config = AppConfig::load(&config_path);
        let mut coord = Self {
            config,
            config_path,
            store: OverlayStore::new(),
            visibility: VisibilitySet::new(),
            publisher: Publisher::new(),
            surface,
            events: EventBus::new(),
            api_state: None,
        };

        if let Some(dir) = coord.config.output_dir.clone() {
            if dir.is_dir() {
                coord.load_dir(&dir);
                coord.ensure_artifacts(&dir);
            } else {
                warn!("Configured output directory is missing: {}", dir.display());
            }
        } else {
            info!("No output directory configured yet");
        }
        coord
    }

    fn load_dir(&mut self, dir: &Path) {
        let (store, visibility) = load_working_set(dir);
        self.store = store;
        self.visibility = visibility;
        self.publisher = Publisher::discover(dir);
    }

    /// Startup bootstrap: publish once if the page would otherwise be
    /// missing a file.
    fn ensure_artifacts(&mut self, dir: &Path) {
        if self.publisher.is_complete(dir) {
            return;
        }
        info!("Artifacts incomplete in {}, rebuilding", dir.display());
        if let Err(e) = self.rebuild() {
            error!("Initial rebuild failed: {}", e);
        }
    }

    // === Accessors ===

    pub fn is_configured(&self) -> bool {
        self.config.output_dir.is_some()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.config.output_dir.as_deref()
    }

    fn require_dir(&self) -> LtResult<PathBuf> {
        self.config.output_dir.clone().ok_or(LtError::NotConfigured)
    }

    pub fn get(&self, id: &OverlayId) -> LtResult<&Overlay> {
        self.store.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Overlay> {
        self.store.all()
    }

    pub fn store(&self) -> &OverlayStore {
        &self.store
    }

    pub fn visibility(&self) -> &VisibilitySet {
        &self.visibility
    }

    pub fn is_visible(&self, id: &OverlayId) -> bool {
        self.visibility.is_visible(id)
    }

    /// Entry document the surface should be showing.
    pub fn current_artifact(&self) -> Option<&Path> {
        self.publisher.current()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Share overlay snapshots with a vendor bridge. Refreshed after every
    /// mutation from here on.
    pub fn attach_api_state(&mut self, state: Arc<SharedApiState>) {
        self.api_state = Some(state);
        self.refresh_api_state();
    }

    fn refresh_api_state(&self) {
        if let Some(state) = &self.api_state {
            state.update(self.store.all(), &self.visibility);
        }
    }

    // === Output directory ===

    /// Switch to `dir`: load whatever state lives there, normalize both
    /// files, persist the choice and publish.
    pub fn set_output_dir(&mut self, dir: impl AsRef<Path>) -> LtResult<PathBuf> {
        let dir = fs::canonicalize(dir.as_ref())
            .map_err(|e| LtError::invalid_output_dir(format!("{}: {}", dir.as_ref().display(), e)))?;
        if !dir.is_dir() {
            return Err(LtError::invalid_output_dir(format!("{} is not a directory", dir.display())));
        }

        let (store, visibility) = load_working_set(&dir);
        store
            .save(&dir.join(STATE_FILE))
            .map_err(|e| LtError::invalid_output_dir(format!("{} is not writable: {}", dir.display(), e)))?;
        visibility.save(&dir.join(VISIBLE_FILE))?;

        let config = AppConfig { output_dir: Some(dir.clone()) };
        config.save(&self.config_path)?;

        info!("Output directory set to {}", dir.display());
        self.config = config;
        self.store = store;
        self.visibility = visibility;
        self.publisher = Publisher::discover(&dir);
        self.events.emit(CoreEvent::OutputDirChanged { path: dir.clone() });
        self.changed();
        self.rebuild()
    }

    // === Structural mutations (full rebuild) ===

    pub fn add(&mut self) -> LtResult<OverlayId> {
        let dir = self.require_dir()?;
        let before = self.store.clone();
        let id = self.store.add();
        let path = self.commit_and_publish(&dir, before)?;
        info!("Added overlay {}", id);
        self.changed();
        self.show(path)?;
        Ok(id)
    }

    /// Duplicate `id` directly after it. The copy starts hidden.
    pub fn clone_overlay(&mut self, id: &OverlayId) -> LtResult<OverlayId> {
        let dir = self.require_dir()?;
        let before = self.store.clone();
        let new_id = self.store.clone_overlay(id)?;
        let path = self.commit_and_publish(&dir, before)?;
        info!("Cloned overlay {} -> {}", id, new_id);
        self.changed();
        self.show(path)?;
        Ok(new_id)
    }

    pub fn remove(&mut self, id: &OverlayId) -> LtResult<Overlay> {
        let dir = self.require_dir()?;
        let before = self.store.clone();
        let removed = self.store.remove(id)?;
        let path = self.commit_and_publish(&dir, before)?;

        if self.visibility.remove(id).is_some() {
            // Orphaned entries are dropped again on the next load
            if let Err(e) = self.visibility.save(&dir.join(VISIBLE_FILE)) {
                warn!("Could not drop visibility of {}: {}", id, e);
            }
        }
        info!("Removed overlay {}", id);
        self.changed();
        self.show(path)?;
        Ok(removed)
    }

    /// Replace an overlay's content (editor save, import).
    pub fn save(&mut self, overlay: Overlay) -> LtResult<()> {
        let dir = self.require_dir()?;
        if let Some(pic) = overlay.profile_picture.as_deref() {
            if !is_relative_asset_name(pic) {
                return Err(LtError::invalid_profile_image(format!(
                    "{:?} must be a file name inside the output directory",
                    pic
                )));
            }
        }
        let id = overlay.id.clone();
        let before = self.store.clone();
        self.store.replace(overlay)?;
        let path = self.commit_and_publish(&dir, before)?;
        debug!("Saved overlay {}", id);
        self.changed();
        self.show(path)
    }

    /// Copy `src` into the output directory as `<id>_<unix secs>.<ext>`,
    /// attach it to the overlay and delete the file it replaces.
    pub fn import_profile_image(&mut self, id: &OverlayId, src: &Path) -> LtResult<String> {
        let dir = self.require_dir()?;
        let old = self.store.get(id)?.profile_picture.clone();
        if !src.is_file() {
            return Err(LtError::invalid_profile_image(format!("{} is not a file", src.display())));
        }

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut name = format!("{}_{}", id, secs);
        if let Some(ext) = src.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy().to_lowercase());
        }
        let dest = dir.join(&name);
        fs::copy(src, &dest).map_err(|e| LtError::io(&dest, e))?;

        let before = self.store.clone();
        self.store.get_mut(id)?.profile_picture = Some(name.clone());
        let path = match self.commit_and_publish(&dir, before) {
            Ok(path) => path,
            Err(e) => {
                if old.as_deref() != Some(name.as_str()) {
                    let _ = fs::remove_file(&dest);
                }
                return Err(e);
            }
        };

        if let Some(old) = old.filter(|o| *o != name && is_relative_asset_name(o)) {
            let old_path = dir.join(&old);
            if old_path.is_file() {
                if let Err(e) = fs::remove_file(&old_path) {
                    warn!("Could not delete old profile image {}: {}", old_path.display(), e);
                }
            }
        }

        info!("Overlay {}: profile image {}", id, name);
        self.changed();
        self.show(path)?;
        Ok(name)
    }

    // === Visibility (state-only) ===

    /// Flip visibility. Returns the new state.
    pub fn toggle(&mut self, id: &OverlayId) -> LtResult<bool> {
        let dir = self.require_dir()?;
        self.store.get(id)?;
        let before = self.visibility.clone();
        let visible = self.visibility.toggle(id);
        self.commit_visibility(&dir, before)?;
        self.visibility_changed(id, visible);
        Ok(visible)
    }

    pub fn set_visible(&mut self, id: &OverlayId, visible: bool) -> LtResult<()> {
        let dir = self.require_dir()?;
        self.store.get(id)?;
        let before = self.visibility.clone();
        self.visibility.set_visible(id, visible);
        self.commit_visibility(&dir, before)?;
        self.visibility_changed(id, visible);
        Ok(())
    }

    /// Show `id` and hide every other overlay.
    pub fn show_exclusive(&mut self, id: &OverlayId) -> LtResult<()> {
        let dir = self.require_dir()?;
        self.store.get(id)?;
        let before = self.visibility.clone();
        self.visibility.show_exclusive(id, self.store.ids());
        self.commit_visibility(&dir, before.clone())?;

        for other in self.store.ids() {
            let now = self.visibility.is_visible(other);
            if before.is_visible(other) != now {
                self.events.emit(CoreEvent::VisibilityChanged { id: other.clone(), visible: now });
            }
        }
        self.refresh_api_state();
        Ok(())
    }

    // === Surface ===

    /// Make sure the browser source exists and shows the current artifact.
    ///
    /// Never recompiles an existing revision. The one exception is a
    /// directory with no entry document at all, which gets a first publish
    /// so there is something to point at.
    pub fn ensure_source(&mut self) -> LtResult<bool> {
        self.require_dir()?;
        let created = self.surface.ensure_exists()?;
        match self.publisher.current().map(Path::to_path_buf) {
            Some(current) => {
                self.surface.repoint(&current)?;
            }
            None => {
                self.rebuild()?;
            }
        }
        Ok(created)
    }

    /// Compile, publish a new revision and repoint the surface.
    pub fn rebuild(&mut self) -> LtResult<PathBuf> {
        let dir = self.require_dir()?;
        let path = self.publish(&dir)?;
        self.show(path.clone())?;
        Ok(path)
    }

    fn publish(&mut self, dir: &Path) -> LtResult<PathBuf> {
        let compiled = compile(&self.store);
        self.publisher.publish(dir, &compiled)
    }

    /// Point the surface at a freshly published revision.
    fn show(&mut self, path: PathBuf) -> LtResult<()> {
        self.events.emit(CoreEvent::ArtifactPublished { path: path.clone() });
        self.surface.repoint(&path)?;
        Ok(())
    }

    // === Vendor commands ===

    pub fn apply_command(&mut self, cmd: ApiCommand) -> LtResult<()> {
        debug!("api command: {:?}", cmd);
        match cmd {
            ApiCommand::ToggleVisible(id) => self.toggle(&id).map(|_| ()),
            ApiCommand::SetVisible { id, visible } => self.set_visible(&id, visible),
            ApiCommand::ShowOnly(id) => self.show_exclusive(&id),
        }
    }

    /// Apply every queued command. Returns how many succeeded.
    pub fn drain_commands(&mut self, rx: &mpsc::Receiver<ApiCommand>) -> usize {
        let mut applied = 0;
        for cmd in rx.try_iter() {
            match self.apply_command(cmd) {
                Ok(()) => applied += 1,
                Err(e) => warn!("api command failed: {}", e),
            }
        }
        applied
    }

    // === Internals ===

    fn commit_store(&mut self, dir: &Path, before: OverlayStore) -> LtResult<()> {
        if let Err(e) = self.store.save(&dir.join(STATE_FILE)) {
            error!("State write failed, reverting: {}", e);
            self.store = before;
            return Err(e);
        }
        Ok(())
    }

    /// Persist the mutated store and publish it. If publishing fails the
    /// store goes back to `before`, in memory and in the state file.
    fn commit_and_publish(&mut self, dir: &Path, before: OverlayStore) -> LtResult<PathBuf> {
        self.commit_store(dir, before.clone())?;
        match self.publish(dir) {
            Ok(path) => Ok(path),
            Err(e) => {
                error!("Publish failed, reverting state: {}", e);
                self.store = before;
                if let Err(re) = self.store.save(&dir.join(STATE_FILE)) {
                    error!("Could not restore state file: {}", re);
                }
                Err(e)
            }
        }
    }

    fn commit_visibility(&mut self, dir: &Path, before: VisibilitySet) -> LtResult<()> {
        if let Err(e) = self.visibility.save(&dir.join(VISIBLE_FILE)) {
            error!("Visibility write failed, reverting: {}", e);
            self.visibility = before;
            return Err(e);
        }
        Ok(())
    }

    fn changed(&self) {
        self.events.emit(CoreEvent::OverlaysChanged);
        self.refresh_api_state();
    }

    fn visibility_changed(&self, id: &OverlayId, visible: bool) {
        debug!("{} -> {}", id, if visible { "visible" } else { "hidden" });
        self.events.emit(CoreEvent::VisibilityChanged { id: id.clone(), visible });
        self.refresh_api_state();
    }
}

/// Tolerant load of both files, reconciled so visibility never names an
/// overlay the store does not have.
fn load_working_set(dir: &Path) -> (OverlayStore, VisibilitySet) {
    let store = OverlayStore::load(&dir.join(STATE_FILE));
    let mut visibility = VisibilitySet::load(&dir.join(VISIBLE_FILE));
    let dropped = visibility.retain_ids(|id| store.contains(id));
    if dropped > 0 {
        info!("Dropped {} stale visibility entr(ies)", dropped);
    }
    (store, visibility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atomic::tests::temp_dir;
    use crate::core::surface::MemorySurface;
    use crate::server::VendorBridge;

    fn setup(name: &str) -> (PathBuf, Coordinator<MemorySurface>) {
        let root = temp_dir(name);
        let out = root.join("out");
        fs::create_dir_all(&out).unwrap();
        let mut coord = Coordinator::open(root.join("lower-thirds.json"), MemorySurface::new());
        coord.set_output_dir(&out).unwrap();
        (root, coord)
    }

    #[test]
    fn unconfigured_mutations_fail() {
        let root = temp_dir("coord_unconfigured");
        let mut coord = Coordinator::open(root.join("cfg.json"), MemorySurface::new());
        assert!(!coord.is_configured());
        assert!(coord.add().unwrap_err().is_not_configured());
        assert!(coord.toggle(&OverlayId::from("lt-a")).unwrap_err().is_not_configured());
        assert!(coord.rebuild().unwrap_err().is_not_configured());
        assert!(coord.ensure_source().unwrap_err().is_not_configured());
        assert_eq!(coord.surface().managed_count(), 0);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn set_output_dir_rejects_missing_dir() {
        let root = temp_dir("coord_bad_dir");
        let mut coord = Coordinator::open(root.join("cfg.json"), MemorySurface::new());
        let err = coord.set_output_dir(root.join("nope")).unwrap_err();
        assert!(matches!(err, LtError::InvalidOutputDir(_)));
        assert!(!coord.is_configured());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn toggle_unknown_id_is_not_found() {
        let (root, mut coord) = setup("coord_toggle_unknown");
        let err = coord.toggle(&OverlayId::from("lt-missing")).unwrap_err();
        assert!(matches!(err, LtError::NotFound(_)));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn remove_cascades_visibility() {
        let (root, mut coord) = setup("coord_remove");
        let id = coord.add().unwrap();
        coord.set_visible(&id, true).unwrap();
        coord.remove(&id).unwrap();
        assert!(coord.visibility().entry(&id).is_none());

        let on_disk = VisibilitySet::try_load(&coord.output_dir().unwrap().join(VISIBLE_FILE)).unwrap();
        assert!(on_disk.is_empty());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn save_rejects_escaping_profile_image() {
        let (root, mut coord) = setup("coord_bad_pic");
        let id = coord.add().unwrap();
        let mut overlay = coord.get(&id).unwrap().clone();
        overlay.profile_picture = Some("../secret.png".to_string());
        let err = coord.save(overlay).unwrap_err();
        assert!(matches!(err, LtError::InvalidProfileImage(_)));
        assert_eq!(coord.get(&id).unwrap().profile_picture, None);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn import_profile_image_replaces_old_file() {
        let (root, mut coord) = setup("coord_import_pic");
        let id = coord.add().unwrap();
        let out = coord.output_dir().unwrap().to_path_buf();

        let stale = format!("{}_1.png", id);
        fs::write(out.join(&stale), b"old").unwrap();
        let mut overlay = coord.get(&id).unwrap().clone();
        overlay.profile_picture = Some(stale.clone());
        coord.save(overlay).unwrap();

        let src = root.join("Face.PNG");
        fs::write(&src, b"png-bytes").unwrap();
        let name = coord.import_profile_image(&id, &src).unwrap();
        assert!(name.starts_with(&format!("{}_", id)));
        assert!(name.ends_with(".png"));
        assert_eq!(fs::read(out.join(&name)).unwrap(), b"png-bytes");
        assert!(!out.join(&stale).exists());
        assert_eq!(coord.get(&id).unwrap().profile_picture.as_deref(), Some(name.as_str()));
        fs::remove_dir_all(&root).ok();
    }

    /// Put a directory where the stylesheet goes so the next publish fails.
    fn block_styles(out: &Path) {
        let styles = out.join(crate::entities::keys::STYLES_FILE);
        fs::remove_file(&styles).unwrap();
        fs::create_dir(&styles).unwrap();
    }

    #[test]
    fn failed_publish_reverts_add_and_keeps_surface() {
        let (root, mut coord) = setup("coord_publish_fail");
        let out = coord.output_dir().unwrap().to_path_buf();
        let a = coord.add().unwrap();
        coord.ensure_source().unwrap();

        let current = coord.current_artifact().unwrap().to_path_buf();
        assert_eq!(coord.surface().local_file(), Some(current.as_path()));
        let state_before = fs::read(out.join(STATE_FILE)).unwrap();
        block_styles(&out);
        coord.events().poll();

        assert!(coord.add().is_err());
        assert_eq!(coord.store().len(), 1);
        assert!(coord.get(&a).is_ok());
        assert_eq!(fs::read(out.join(STATE_FILE)).unwrap(), state_before);
        assert_eq!(coord.current_artifact(), Some(current.as_path()));
        assert_eq!(coord.surface().local_file(), Some(current.as_path()));
        assert!(coord.events().poll().is_empty());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn failed_publish_keeps_removed_overlay_and_its_visibility() {
        let (root, mut coord) = setup("coord_remove_fail");
        let out = coord.output_dir().unwrap().to_path_buf();
        let a = coord.add().unwrap();
        coord.set_visible(&a, true).unwrap();
        block_styles(&out);

        assert!(coord.remove(&a).is_err());
        assert!(coord.get(&a).is_ok());
        assert!(coord.is_visible(&a));
        let on_disk = VisibilitySet::try_load(&out.join(VISIBLE_FILE)).unwrap();
        assert!(on_disk.is_visible(&a));
        assert!(OverlayStore::try_load(&out.join(STATE_FILE)).unwrap().contains(&a));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn failed_publish_discards_imported_image() {
        let (root, mut coord) = setup("coord_import_fail");
        let out = coord.output_dir().unwrap().to_path_buf();
        let id = coord.add().unwrap();
        let src = root.join("face.png");
        fs::write(&src, b"png-bytes").unwrap();
        block_styles(&out);

        assert!(coord.import_profile_image(&id, &src).is_err());
        assert_eq!(coord.get(&id).unwrap().profile_picture, None);
        let leftovers = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".png"))
            .count();
        assert_eq!(leftovers, 0);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn vendor_commands_reach_the_coordinator() {
        let (root, mut coord) = setup("coord_vendor");
        let a = coord.add().unwrap();
        let b = coord.add().unwrap();
        let state = Arc::new(SharedApiState::default());
        coord.attach_api_state(Arc::clone(&state));
        let (bridge, rx) = VendorBridge::new(state);

        bridge.handle("SetVisible", &serde_json::json!({ "id": a.as_str(), "visible": true }));
        bridge.handle("ShowOnly", &serde_json::json!({ "id": b.as_str() }));
        assert_eq!(coord.drain_commands(&rx), 2);
        assert!(!coord.is_visible(&a));
        assert!(coord.is_visible(&b));

        let listed = bridge.handle("ListLowerThirds", &serde_json::json!({}));
        assert_eq!(listed["items"][1]["isVisible"], true);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn events_report_changes() {
        let (root, mut coord) = setup("coord_events");
        coord.events().poll();
        let id = coord.add().unwrap();
        coord.toggle(&id).unwrap();
        let events = coord.events().poll();
        assert!(events.contains(&CoreEvent::OverlaysChanged));
        assert!(events.iter().any(|e| matches!(e, CoreEvent::ArtifactPublished { .. })));
        assert_eq!(
            events.last(),
            Some(&CoreEvent::VisibilityChanged { id, visible: true })
        );
        fs::remove_dir_all(&root).ok();
    }
}
