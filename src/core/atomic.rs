//! Write-temp-then-rename helpers.
//!
//! Every persisted file (state, visibility, stylesheet, script, entry
//! documents, config record) goes through [`write_atomic`]. A reader either
//! sees the previous content or the new content, never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::trace;
use serde::Serialize;

use super::error::{LtError, LtResult};

/// Sibling temp path: `.name.tmp-<pid>` in the same directory, so the final
/// rename never crosses a filesystem boundary.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}

/// Content written and synced next to its destination, not yet visible.
/// Dropping it without [`Staged::commit`] removes the temp file.
#[derive(Debug)]
pub struct Staged {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl Staged {
    /// Rename the temp file over the destination.
    pub fn commit(mut self) -> LtResult<()> {
        fs::rename(&self.tmp, &self.dest).map_err(|e| LtError::io(&self.dest, e))?;
        self.committed = true;
        trace!("atomic write: {}", self.dest.display());
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// First half of [`write_atomic`]: write and sync the temp file.
pub fn stage(path: &Path, bytes: &[u8]) -> LtResult<Staged> {
    let staged = Staged {
        tmp: temp_path_for(path),
        dest: path.to_path_buf(),
        committed: false,
    };

    let result = (|| {
        let mut file = fs::File::create(&staged.tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    // On error `staged` drops and removes the partial temp file
    result.map_err(|e| LtError::io(path, e))?;
    Ok(staged)
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> LtResult<()> {
    stage(path, bytes)?.commit()
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> LtResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| LtError::malformed(path, e))?;
    write_atomic(path, &json)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lower_thirds_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn replaces_existing_content() {
        let dir = temp_dir("atomic_replace");
        let path = dir.join("a.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        // No temp files left behind
        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt".to_string()]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_parent_is_io_error_and_leaves_nothing() {
        let dir = temp_dir("atomic_missing");
        let path = dir.join("nope").join("a.txt");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, LtError::Io { .. }));
        assert!(!path.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn staged_write_is_invisible_until_commit() {
        let dir = temp_dir("atomic_staged");
        let path = dir.join("a.txt");
        write_atomic(&path, b"old").unwrap();

        let staged = stage(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"old");
        drop(staged);
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1, "dropped temp is removed");

        stage(&path, b"new").unwrap().commit().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn json_is_pretty() {
        let dir = temp_dir("atomic_json");
        let path = dir.join("v.json");
        write_json_atomic(&path, &serde_json::json!({"a": true})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"a\": true"));
        fs::remove_dir_all(&dir).ok();
    }
}
