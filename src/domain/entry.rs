use super::observer::EntryObserver;
use super::{mime_type_from_extension, DeleteMode, ViewerKind};
use crate::error::{DragboxError, Result};
use chrono::{DateTime, Local, Utc};
use image::RgbaImage;
use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`FileEntry`], unique for the life of the process.
///
/// Background jobs carry this instead of a reference so their results can
/// be matched against whatever listing is current when they finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        EntryId(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Metadata from a single stat of the entry's path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl FileAttributes {
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            size: Some(metadata.len()),
        }
    }
}

/// One child of a browsed directory
pub struct FileEntry {
    id: EntryId,
    name: String,
    directory: Arc<Path>,
    attributes: OnceCell<Option<FileAttributes>>,
    thumbnail: Option<RgbaImage>,
    edit_mode: bool,
    observer: Option<Weak<dyn EntryObserver>>,
}

impl FileEntry {
    pub(crate) fn new(name: String, directory: Arc<Path>) -> Self {
        Self {
            id: EntryId::next(),
            name,
            directory,
            attributes: OnceCell::new(),
            thumbnail: None,
            edit_mode: false,
            observer: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the backing filesystem object
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Extension of the current name, empty when there is none
    pub fn extension(&self) -> &str {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        mime_type_from_extension(self.extension())
    }

    pub fn viewer_kind(&self) -> ViewerKind {
        if self.is_directory() {
            ViewerKind::Directory
        } else {
            ViewerKind::from_mime_type(self.mime_type())
        }
    }

    /// Stats the path on every call; `false` if the stat fails
    pub fn is_directory(&self) -> bool {
        fs::metadata(self.path())
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Attributes from the first stat of this entry, memoized.
    ///
    /// A failed stat is memoized too and yields `None`.
    pub fn attributes(&self) -> Option<&FileAttributes> {
        self.attributes
            .get_or_init(|| match stat(&self.path()) {
                Ok(attributes) => Some(attributes),
                Err(e) => {
                    tracing::warn!("{e}");
                    None
                }
            })
            .as_ref()
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.attributes().and_then(|a| a.modified)
    }

    pub fn size(&self) -> Option<u64> {
        self.attributes().and_then(|a| a.size)
    }

    /// Subtitle shown under the name: local timestamp and byte size
    pub fn detail_line(&self) -> String {
        let timestamp = self
            .modified()
            .map(|date| {
                date.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "N/A".to_string());
        let bytesize = self
            .size()
            .map(|size| format!("{} bytes", size))
            .unwrap_or_else(|| "N/A".to_string());
        format!("{} {}", timestamp, bytesize)
    }

    pub fn thumbnail(&self) -> Option<&RgbaImage> {
        self.thumbnail.as_ref()
    }

    pub(crate) fn set_thumbnail(&mut self, thumbnail: Option<RgbaImage>) {
        self.thumbnail = thumbnail;
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Sets the edit-mode flag, notifying the observer only on change
    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        if self.edit_mode == edit_mode {
            return;
        }
        self.edit_mode = edit_mode;
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.edit_mode_changed(self);
        }
    }

    /// Attaches the observer that receives edit-mode changes.
    ///
    /// Only a weak reference is kept.
    pub fn set_observer<O: EntryObserver + 'static>(&mut self, observer: &Arc<O>) {
        self.observer = Some(Arc::downgrade(observer) as Weak<dyn EntryObserver>);
    }

    /// Moves the backing object to `new_name` in the same directory.
    ///
    /// On success the entry takes the new name. Only reachable through
    /// `FileCollection::rename`, which notifies the listing observer.
    pub(crate) fn rename(&mut self, new_name: &str) -> bool {
        match self.try_rename(new_name) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    fn try_rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let from = self.path();
        let to = self.directory.join(new_name);
        move_item(&from, &to)?;
        tracing::info!("Renamed {} to {}", from.display(), to.display());
        self.name = new_name.to_string();
        Ok(())
    }

    /// Permanently deletes the backing object; failures are only logged
    pub fn remove(&self) -> bool {
        self.remove_with(DeleteMode::Permanent)
    }

    pub fn remove_with(&self, mode: DeleteMode) -> bool {
        let path = self.path();
        match delete_item(&path, mode) {
            Ok(()) => {
                tracing::info!("Deleted {}", path.display());
                true
            }
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("has_thumbnail", &self.thumbnail.is_some())
            .field("edit_mode", &self.edit_mode)
            .finish()
    }
}

fn stat(path: &Path) -> Result<FileAttributes> {
    fs::metadata(path)
        .map(|metadata| FileAttributes::from_metadata(&metadata))
        .map_err(|source| DragboxError::StatFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Rejects names that would escape the directory or are not names at all
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains(std::path::MAIN_SEPARATOR)
    {
        return Err(DragboxError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub(crate) fn exists_on_disk(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Moves `from` to `to`, refusing to replace an existing destination.
///
/// Regular files fall back to copy + remove when a plain rename fails,
/// e.g. across filesystems.
pub(crate) fn move_item(from: &Path, to: &Path) -> Result<()> {
    let move_failed = |reason: String| DragboxError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason,
    };

    if exists_on_disk(to) {
        return Err(move_failed("destination already exists".to_string()));
    }

    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let is_file = fs::symlink_metadata(from)
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(move_failed(rename_err.to_string()));
    }

    tracing::debug!(
        "Rename {} failed ({rename_err}), copying instead",
        from.display()
    );
    fs::copy(from, to).map_err(|e| move_failed(e.to_string()))?;
    if let Err(e) = fs::remove_file(from) {
        // Leave a single copy behind rather than two
        if let Err(cleanup) = fs::remove_file(to) {
            tracing::warn!(
                "Could not remove copy {} after failed move: {cleanup}",
                to.display()
            );
        }
        return Err(move_failed(e.to_string()));
    }
    Ok(())
}

pub(crate) fn delete_item(path: &Path, mode: DeleteMode) -> Result<()> {
    let delete_failed = |reason: String| DragboxError::DeleteFailed {
        path: path.to_path_buf(),
        reason,
    };

    match mode {
        DeleteMode::Trash => trash::delete(path).map_err(|e| delete_failed(e.to_string())),
        DeleteMode::Permanent => {
            let metadata = fs::symlink_metadata(path).map_err(|e| delete_failed(e.to_string()))?;
            let removed = if metadata.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(|e| delete_failed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn entry_in(dir: &TempDir, name: &str) -> FileEntry {
        FileEntry::new(name.to_string(), Arc::from(dir.path()))
    }

    #[derive(Default)]
    struct EditModeRecorder {
        changes: Mutex<Vec<(String, bool)>>,
    }

    impl EntryObserver for EditModeRecorder {
        fn edit_mode_changed(&self, entry: &FileEntry) {
            self.changes
                .lock()
                .unwrap()
                .push((entry.name().to_string(), entry.edit_mode()));
        }
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn test_entries_get_distinct_ids() {
            let dir = TempDir::new().unwrap();
            let a = entry_in(&dir, "a.txt");
            let b = entry_in(&dir, "a.txt");
            assert_ne!(a.id(), b.id());
        }

        #[test]
        fn test_path_is_directory_joined_with_name() {
            let dir = TempDir::new().unwrap();
            let entry = entry_in(&dir, "report.pdf");
            assert_eq!(entry.path(), dir.path().join("report.pdf"));
            assert_eq!(entry.extension(), "pdf");
            assert_eq!(entry.mime_type(), Some("application/pdf"));
        }

        #[test]
        fn test_extension_empty_without_dot() {
            let dir = TempDir::new().unwrap();
            assert_eq!(entry_in(&dir, "Makefile").extension(), "");
            assert_eq!(entry_in(&dir, ".profile").extension(), "");
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn test_attributes_read_size_and_date() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("note.txt"), b"twelve bytes").unwrap();
            let entry = entry_in(&dir, "note.txt");

            assert_eq!(entry.size(), Some(12));
            assert!(entry.modified().is_some());
            assert!(entry.detail_line().ends_with("12 bytes"));
        }

        #[test]
        fn test_attributes_memoized_after_first_read() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("note.txt");
            fs::write(&path, b"abc").unwrap();
            let entry = entry_in(&dir, "note.txt");

            assert_eq!(entry.size(), Some(3));
            fs::write(&path, b"abcdef").unwrap();
            assert_eq!(entry.size(), Some(3));
        }

        #[test]
        fn test_missing_file_has_no_attributes() {
            let dir = TempDir::new().unwrap();
            let entry = entry_in(&dir, "ghost.txt");

            assert!(entry.attributes().is_none());
            assert_eq!(entry.size(), None);
            assert_eq!(entry.modified(), None);
            assert_eq!(entry.detail_line(), "N/A N/A");
        }

        #[test]
        fn test_is_directory() {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("sub")).unwrap();
            fs::write(dir.path().join("file.txt"), b"x").unwrap();

            assert!(entry_in(&dir, "sub").is_directory());
            assert!(!entry_in(&dir, "file.txt").is_directory());
            assert!(!entry_in(&dir, "missing").is_directory());
        }

        #[test]
        fn test_viewer_kind() {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("photos.png")).unwrap();

            assert_eq!(
                entry_in(&dir, "photos.png").viewer_kind(),
                ViewerKind::Directory
            );
            assert_eq!(entry_in(&dir, "a.jpg").viewer_kind(), ViewerKind::Image);
            assert_eq!(entry_in(&dir, "a.pdf").viewer_kind(), ViewerKind::Pdf);
            assert_eq!(entry_in(&dir, "a.doc").viewer_kind(), ViewerKind::Binary);
        }
    }

    mod edit_mode_tests {
        use super::*;

        #[test]
        fn test_setting_same_value_does_not_notify() {
            let dir = TempDir::new().unwrap();
            let recorder = Arc::new(EditModeRecorder::default());
            let mut entry = entry_in(&dir, "a.txt");
            entry.set_observer(&recorder);

            entry.set_edit_mode(false);

            assert!(recorder.changes.lock().unwrap().is_empty());
        }

        #[test]
        fn test_toggle_on_and_off_notifies_twice() {
            let dir = TempDir::new().unwrap();
            let recorder = Arc::new(EditModeRecorder::default());
            let mut entry = entry_in(&dir, "a.txt");
            entry.set_observer(&recorder);

            entry.set_edit_mode(true);
            entry.set_edit_mode(true);
            entry.set_edit_mode(false);

            let changes = recorder.changes.lock().unwrap();
            assert_eq!(
                *changes,
                vec![("a.txt".to_string(), true), ("a.txt".to_string(), false)]
            );
        }

        #[test]
        fn test_dropped_observer_is_ignored() {
            let dir = TempDir::new().unwrap();
            let recorder = Arc::new(EditModeRecorder::default());
            let mut entry = entry_in(&dir, "a.txt");
            entry.set_observer(&recorder);
            drop(recorder);

            entry.set_edit_mode(true);
            assert!(entry.edit_mode());
        }
    }

    mod rename_tests {
        use super::*;

        #[test]
        fn test_rename_moves_file() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("x.txt"), b"data").unwrap();
            let mut entry = entry_in(&dir, "x.txt");

            assert!(entry.rename("y.txt"));

            assert_eq!(entry.name(), "y.txt");
            assert!(!dir.path().join("x.txt").exists());
            assert_eq!(fs::read(dir.path().join("y.txt")).unwrap(), b"data");
        }

        #[test]
        fn test_rename_onto_existing_name_fails() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("x.txt"), b"x").unwrap();
            fs::write(dir.path().join("y.txt"), b"y").unwrap();
            let mut entry = entry_in(&dir, "x.txt");

            assert!(!entry.rename("y.txt"));

            assert_eq!(entry.name(), "x.txt");
            assert_eq!(fs::read(dir.path().join("x.txt")).unwrap(), b"x");
            assert_eq!(fs::read(dir.path().join("y.txt")).unwrap(), b"y");
        }

        #[test]
        fn test_rename_missing_source_fails() {
            let dir = TempDir::new().unwrap();
            let mut entry = entry_in(&dir, "gone.txt");

            assert!(!entry.rename("other.txt"));
            assert_eq!(entry.name(), "gone.txt");
        }

        #[test]
        fn test_rename_rejects_path_like_names() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("x.txt"), b"x").unwrap();
            let mut entry = entry_in(&dir, "x.txt");

            assert!(!entry.rename(""));
            assert!(!entry.rename(".."));
            assert!(!entry.rename("sub/y.txt"));
            assert_eq!(entry.name(), "x.txt");
        }
    }

    mod remove_tests {
        use super::*;

        #[test]
        fn test_remove_file() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("old.log"), b"x").unwrap();

            assert!(entry_in(&dir, "old.log").remove());
            assert!(!dir.path().join("old.log").exists());
        }

        #[test]
        fn test_remove_directory_recursively() {
            let dir = TempDir::new().unwrap();
            let sub = dir.path().join("sub");
            fs::create_dir(&sub).unwrap();
            fs::write(sub.join("inner.txt"), b"x").unwrap();

            assert!(entry_in(&dir, "sub").remove());
            assert!(!sub.exists());
        }

        #[test]
        fn test_remove_missing_file_reports_failure() {
            let dir = TempDir::new().unwrap();
            assert!(!entry_in(&dir, "ghost").remove());
        }
    }

    mod move_item_tests {
        use super::*;

        #[test]
        fn test_move_into_other_directory() {
            let src_dir = TempDir::new().unwrap();
            let dst_dir = TempDir::new().unwrap();
            let from = src_dir.path().join("in.bin");
            let to = dst_dir.path().join("in.bin");
            fs::write(&from, b"payload").unwrap();

            move_item(&from, &to).unwrap();

            assert!(!from.exists());
            assert_eq!(fs::read(&to).unwrap(), b"payload");
        }

        #[test]
        fn test_move_refuses_existing_destination() {
            let dir = TempDir::new().unwrap();
            let from = dir.path().join("a");
            let to = dir.path().join("b");
            fs::write(&from, b"a").unwrap();
            fs::write(&to, b"b").unwrap();

            let err = move_item(&from, &to).unwrap_err();
            assert!(matches!(err, DragboxError::MoveFailed { .. }));
        }

        #[cfg(unix)]
        #[test]
        fn test_failed_move_leaves_single_copy() {
            use std::os::unix::fs::PermissionsExt;

            let src_dir = TempDir::new().unwrap();
            let dst_dir = TempDir::new().unwrap();
            let locked = src_dir.path().join("locked");
            fs::create_dir(&locked).unwrap();
            let from = locked.join("in.bin");
            let to = dst_dir.path().join("in.bin");
            fs::write(&from, b"payload").unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

            if fs::write(locked.join("write-check"), b"x").is_ok() {
                eprintln!("Skipping test: directory permissions are not enforced");
                fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
                return;
            }

            let err = move_item(&from, &to).unwrap_err();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

            assert!(matches!(err, DragboxError::MoveFailed { .. }));
            assert_eq!(fs::read(&from).unwrap(), b"payload");
            assert!(!to.exists());
        }
    }
}
