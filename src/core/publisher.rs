//! Revisioned publisher: writes compiled artifacts and tracks the current
//! entry document.
//!
//! Each full rebuild gets a fresh `lt-index-<revision>.html`. The rendering
//! surface caches by path, so a new file name is what forces it to refetch.
//! Old revisions stay on disk.
//!
//! All three files are written to temp siblings first. Only once every temp
//! is on disk are they renamed into place, stylesheet, script, then entry
//! document. `current` only moves after the entry document rename, so a
//! failed publish leaves the previous revision authoritative.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use super::atomic::stage;
use super::compiler::CompiledArtifacts;
use super::error::LtResult;
use crate::entities::keys::{INDEX_EXT, INDEX_PREFIX, SCRIPT_FILE, STYLES_FILE};

/// File name for a revision.
pub fn index_file_name(revision: u64) -> String {
    format!("{}{}.{}", INDEX_PREFIX, revision, INDEX_EXT)
}

/// Inverse of [`index_file_name`].
pub fn parse_index_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(INDEX_PREFIX)?
        .strip_suffix(INDEX_EXT)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Revisions further ahead of the clock than this are treated as foreign
/// files and ignored by [`Publisher::discover`].
const MAX_FUTURE_MS: u64 = 365 * 24 * 60 * 60 * 1000;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default)]
pub struct Publisher {
    /// Highest revision seen on disk or issued by this process
    last_revision: u64,
    current: Option<(u64, PathBuf)>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `out_dir` for existing entry documents; the newest becomes
    /// current. Unreadable directories just yield an empty publisher.
    pub fn discover(out_dir: &Path) -> Self {
        let entries = match fs::read_dir(out_dir) {
            Ok(e) => e,
            Err(e) => {
                debug!("publisher: cannot scan {}: {}", out_dir.display(), e);
                return Self::new();
            }
        };

        let horizon = now_millis().saturating_add(MAX_FUTURE_MS);
        let newest = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| {
                let name = e.file_name();
                parse_index_file_name(&name.to_string_lossy()).map(|rev| (rev, e.path()))
            })
            .filter(|(rev, path)| {
                if *rev > horizon {
                    warn!("publisher: ignoring implausible revision {} ({})", rev, path.display());
                    return false;
                }
                true
            })
            .max_by_key(|(rev, _)| *rev);

        match newest {
            Some((rev, path)) => {
                debug!("publisher: current revision {} ({})", rev, path.display());
                Self {
                    last_revision: rev,
                    current: Some((rev, path)),
                }
            }
            None => Self::new(),
        }
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_ref().map(|(_, p)| p.as_path())
    }

    pub fn current_revision(&self) -> Option<u64> {
        self.current.as_ref().map(|(rev, _)| *rev)
    }

    /// Wall-clock millis, bumped past the last issued revision so two
    /// rebuilds in the same millisecond still get distinct names.
    fn next_revision(&self) -> u64 {
        now_millis().max(self.last_revision.saturating_add(1))
    }

    /// Write merged files and a new entry document, then make it current.
    pub fn publish(&mut self, out_dir: &Path, compiled: &CompiledArtifacts) -> LtResult<PathBuf> {
        let revision = self.next_revision();
        let path = out_dir.join(index_file_name(revision));

        let result = (|| {
            let styles = stage(&out_dir.join(STYLES_FILE), compiled.styles.as_bytes())?;
            let script = stage(&out_dir.join(SCRIPT_FILE), compiled.script.as_bytes())?;
            let index = stage(&path, compiled.entry_document(revision).as_bytes())?;
            styles.commit()?;
            script.commit()?;
            index.commit()
        })();

        if let Err(e) = result {
            warn!("publish failed, keeping revision {:?}: {}", self.current_revision(), e);
            return Err(e);
        }

        self.last_revision = revision;
        self.current = Some((revision, path.clone()));
        info!(
            "Published revision {} ({} overlay(s)) -> {}",
            revision,
            compiled.overlay_count,
            path.display()
        );
        Ok(path)
    }

    /// Artifacts needed by the page are all present.
    pub fn is_complete(&self, out_dir: &Path) -> bool {
        self.current().is_some_and(|p| p.is_file())
            && out_dir.join(STYLES_FILE).is_file()
            && out_dir.join(SCRIPT_FILE).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atomic::tests::temp_dir;
    use crate::core::compiler::compile;
    use crate::entities::OverlayStore;

    #[test]
    fn file_name_round_trip() {
        assert_eq!(index_file_name(17), "lt-index-17.html");
        assert_eq!(parse_index_file_name("lt-index-17.html"), Some(17));
        assert_eq!(parse_index_file_name("lt-index-x.html"), None);
        assert_eq!(parse_index_file_name("lt-index-17.htm"), None);
        assert_eq!(parse_index_file_name("lt-styles.css"), None);
    }

    #[test]
    fn consecutive_publishes_get_distinct_names_and_keep_old() {
        let dir = temp_dir("publisher_distinct");
        let mut store = OverlayStore::new();
        store.add();
        let compiled = compile(&store);

        let mut publisher = Publisher::new();
        let first = publisher.publish(&dir, &compiled).unwrap();
        let second = publisher.publish(&dir, &compiled).unwrap();
        assert_ne!(first, second);
        assert!(first.is_file());
        assert!(second.is_file());
        assert_eq!(publisher.current(), Some(second.as_path()));
        assert!(publisher.is_complete(&dir));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn discover_picks_highest_revision_and_stays_monotonic() {
        let dir = temp_dir("publisher_discover");
        // A revision far in the future must still be exceeded
        let future = now_millis() + 1_000_000;
        fs::write(dir.join(index_file_name(5)), b"old").unwrap();
        fs::write(dir.join(index_file_name(future)), b"new").unwrap();
        fs::write(dir.join("lt-index-garbage.html"), b"?").unwrap();

        let mut publisher = Publisher::discover(&dir);
        assert_eq!(publisher.current_revision(), Some(future));

        let next = publisher.publish(&dir, &compile(&OverlayStore::new())).unwrap();
        assert_eq!(publisher.current_revision(), Some(future + 1));
        assert_eq!(next, dir.join(index_file_name(future + 1)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_publish_keeps_previous_current() {
        let dir = temp_dir("publisher_fail");
        let mut publisher = Publisher::new();
        let compiled = compile(&OverlayStore::new());
        let good = publisher.publish(&dir, &compiled).unwrap();

        let missing = dir.join("gone");
        assert!(publisher.publish(&missing, &compiled).is_err());
        assert_eq!(publisher.current(), Some(good.as_path()));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn discover_ignores_revisions_far_in_the_future() {
        let dir = temp_dir("publisher_overflow");
        fs::write(dir.join(index_file_name(5)), b"old").unwrap();
        fs::write(dir.join(index_file_name(u64::MAX)), b"bogus").unwrap();

        let mut publisher = Publisher::discover(&dir);
        assert_eq!(publisher.current_revision(), Some(5));

        publisher.publish(&dir, &compile(&OverlayStore::new())).unwrap();
        let rev = publisher.current_revision().unwrap();
        assert!(rev > 5 && rev < u64::MAX);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_rename_leaves_no_new_files_behind() {
        let dir = temp_dir("publisher_staged");
        let mut publisher = Publisher::new();
        let compiled = compile(&OverlayStore::new());
        let good = publisher.publish(&dir, &compiled).unwrap();

        // A directory where the script goes makes its rename fail
        fs::remove_file(dir.join(SCRIPT_FILE)).unwrap();
        fs::create_dir(dir.join(SCRIPT_FILE)).unwrap();

        let mut store = OverlayStore::new();
        store.add();
        assert!(publisher.publish(&dir, &compile(&store)).is_err());
        assert_eq!(publisher.current(), Some(good.as_path()));

        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut expected = vec![
            SCRIPT_FILE.to_string(),
            STYLES_FILE.to_string(),
            good.file_name().unwrap().to_string_lossy().into_owned(),
        ];
        expected.sort();
        assert_eq!(names, expected, "no temp or new entry document remains");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn discover_on_missing_dir_is_empty() {
        let publisher = Publisher::discover(Path::new("/definitely/not/here"));
        assert!(publisher.current().is_none());
    }
}
