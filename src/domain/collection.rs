use super::entry::{exists_on_disk, move_item, FileEntry};
use super::observer::CollectionObserver;
use super::{DeleteMode, EntryId};
use crate::async_thumbnail::{BackgroundEvent, BackgroundQueue, ThumbnailPool};
use crate::error::{DragboxError, Result};
use crate::thumbnail::ThumbnailSize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

type Completion = Box<dyn FnOnce()>;

/// Lists the names of every direct child of `directory`, in `read_dir` order.
///
/// Children whose names are not valid UTF-8 are skipped.
pub(crate) fn enumerate(directory: &Path) -> Result<Vec<String>> {
    let read_dir = fs::read_dir(directory).map_err(|source| DragboxError::EnumerationFailed {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry_result in read_dir {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {e}", directory.display());
                continue;
            }
        };
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::warn!("Skipping non UTF-8 name {:?} in {}", raw, directory.display());
            }
        }
    }
    Ok(names)
}

/// The listing of one directory.
///
/// Owns its entries exclusively and must be driven from a single thread:
/// background results only take effect when that thread calls
/// [`process_events`](Self::process_events) or one of the `wait_*` methods.
pub struct FileCollection {
    directory: Arc<Path>,
    entries: Option<Vec<FileEntry>>,
    observer: Option<Weak<dyn CollectionObserver>>,
    queue: BackgroundQueue,
    thumbnail_size: ThumbnailSize,
    delete_mode: DeleteMode,
    /// Entries of the current listing still waiting for a thumbnail
    pending_thumbnails: HashSet<EntryId>,
    /// Latest generation handed out to a reload
    generation: u64,
    /// Generation of the listing currently held
    applied_generation: u64,
    outstanding_listings: usize,
    completions: HashMap<u64, Completion>,
}

impl FileCollection {
    pub fn new(directory: impl Into<PathBuf>, pool: &ThumbnailPool) -> Self {
        let directory: PathBuf = directory.into();
        Self {
            directory: Arc::from(directory),
            entries: None,
            observer: None,
            queue: BackgroundQueue::new(pool.clone()),
            thumbnail_size: ThumbnailSize::default(),
            delete_mode: DeleteMode::default(),
            pending_thumbnails: HashSet::new(),
            generation: 0,
            applied_generation: 0,
            outstanding_listings: 0,
            completions: HashMap::new(),
        }
    }

    pub fn with_thumbnail_size(mut self, size: ThumbnailSize) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    /// Attaches the listing observer. Only a weak reference is kept.
    pub fn set_observer<O: CollectionObserver + 'static>(&mut self, observer: &Arc<O>) {
        self.observer = Some(Arc::downgrade(observer) as Weak<dyn CollectionObserver>);
    }

    fn observer(&self) -> Option<Arc<dyn CollectionObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn thumbnail_size(&self) -> ThumbnailSize {
        self.thumbnail_size
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    /// Number of entries, 0 until a reload succeeds
    pub fn count(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        self.entries.as_ref()?.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FileEntry> {
        self.entries.as_mut()?.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().flatten()
    }

    /// Current index of the entry with this identity
    pub fn index_of(&self, id: EntryId) -> Option<usize> {
        self.iter().position(|entry| entry.id() == id)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.iter().position(|entry| entry.name() == name)
    }

    /// Whether no listing or thumbnail job is outstanding
    pub fn is_idle(&self) -> bool {
        self.outstanding_listings == 0 && self.pending_thumbnails.is_empty()
    }

    /// Re-enumerates the directory on the calling thread.
    ///
    /// The observer sees `reloaded` before this returns; thumbnails follow
    /// through event processing.
    pub fn reload(&mut self) {
        self.reload_inline(None);
    }

    /// Like [`reload`](Self::reload), running `on_done` right after the
    /// listing-changed notification
    pub fn reload_then(&mut self, on_done: impl FnOnce() + 'static) {
        self.reload_inline(Some(Box::new(on_done)));
    }

    fn reload_inline(&mut self, on_done: Option<Completion>) {
        self.generation += 1;
        let result = enumerate(&self.directory);
        self.apply_listing(self.generation, result, on_done);
    }

    /// Starts enumeration on the worker pool; the listing is applied when
    /// this thread next processes events
    pub fn begin_reload(&mut self) {
        self.begin_reload_inner(None);
    }

    pub fn begin_reload_then(&mut self, on_done: impl FnOnce() + 'static) {
        self.begin_reload_inner(Some(Box::new(on_done)));
    }

    fn begin_reload_inner(&mut self, on_done: Option<Completion>) {
        self.generation += 1;
        if let Some(on_done) = on_done {
            self.completions.insert(self.generation, on_done);
        }
        self.outstanding_listings += 1;
        self.queue
            .spawn_listing(self.generation, Arc::clone(&self.directory));
    }

    fn apply_listing(
        &mut self,
        generation: u64,
        result: Result<Vec<String>>,
        on_done: Option<Completion>,
    ) {
        if generation < self.applied_generation {
            tracing::debug!(
                "Dropping listing {generation} of {}, already showing {}",
                self.directory.display(),
                self.applied_generation
            );
            if let Some(on_done) = on_done {
                on_done();
            }
            return;
        }
        self.applied_generation = generation;
        self.pending_thumbnails.clear();

        let observer = self.observer();
        self.entries = match result {
            Ok(names) => Some(
                names
                    .into_iter()
                    .map(|name| FileEntry::new(name, Arc::clone(&self.directory)))
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("{e}");
                if let Some(observer) = &observer {
                    observer.reload_failed(&e);
                }
                None
            }
        };

        tracing::debug!(
            "Listed {} entries in {}",
            self.count(),
            self.directory.display()
        );
        if let Some(observer) = &observer {
            observer.reloaded(self.count());
        }
        if let Some(on_done) = on_done {
            on_done();
        }

        let jobs: Vec<(EntryId, PathBuf)> = self
            .iter()
            .map(|entry| (entry.id(), entry.path()))
            .collect();
        for (id, path) in jobs {
            self.pending_thumbnails.insert(id);
            self.queue.spawn_thumbnail(id, path, self.thumbnail_size);
        }
    }

    fn apply_event(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Listing { generation, result } => {
                self.outstanding_listings = self.outstanding_listings.saturating_sub(1);
                let on_done = self.completions.remove(&generation);
                self.apply_listing(generation, result, on_done);
            }
            BackgroundEvent::Thumbnail { id, thumbnail } => {
                self.pending_thumbnails.remove(&id);
                let Some(index) = self.index_of(id) else {
                    tracing::debug!("Dropping thumbnail for an entry no longer listed");
                    return;
                };
                if let Some(entry) = self.get_mut(index) {
                    entry.set_thumbnail(thumbnail);
                }
                if let Some(observer) = self.observer() {
                    observer.updated(index);
                }
            }
        }
    }

    /// Applies every finished background result without blocking.
    /// Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.queue.try_next() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Blocks up to `timeout` for the first background result, then drains
    /// whatever else has finished.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_for_events(&mut self, timeout: Duration) -> usize {
        match self.queue.next_timeout(timeout) {
            Some(event) => {
                self.apply_event(event);
                1 + self.process_events()
            }
            None => 0,
        }
    }

    /// Processes events until [`is_idle`](Self::is_idle) or the deadline.
    /// Returns whether the collection became idle.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.process_events();
        while !self.is_idle() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.wait_for_events(remaining) == 0 {
                return self.is_idle();
            }
        }
        true
    }

    /// Emits `updated` for the entry with this identity, if still listed
    pub fn notify_updated(&self, id: EntryId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        if let Some(observer) = self.observer() {
            observer.updated(index);
        }
    }

    /// Deletes the entry's backing object and drops it from the listing.
    ///
    /// The entry leaves the listing even when the delete fails; the failure
    /// is only logged. The observer is told through `removed`.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let count = self.count();
        let entries = match self.entries.as_mut() {
            Some(entries) if index < count => entries,
            _ => return Err(DragboxError::IndexOutOfBounds { index, count }),
        };

        let entry = entries.remove(index);
        entry.remove_with(self.delete_mode);
        self.pending_thumbnails.remove(&entry.id());

        if let Some(observer) = self.observer() {
            observer.removed(index);
        }
        Ok(())
    }

    /// Renames the entry at `index` on disk, notifying `updated` on success.
    ///
    /// Keeping the current name succeeds without touching the filesystem.
    pub fn rename(&mut self, index: usize, new_name: &str) -> bool {
        let Some(entry) = self.get_mut(index) else {
            tracing::warn!("Rename of missing entry {index}");
            return false;
        };
        if entry.name() == new_name {
            return true;
        }
        if !entry.rename(new_name) {
            return false;
        }
        let id = entry.id();
        self.notify_updated(id);
        true
    }

    /// A path in this directory for `proposed_name` that does not exist on
    /// disk, numbering the stem `name(2).ext`, `name(3).ext`, ... as needed
    pub fn unique_destination(&self, proposed_name: &str) -> PathBuf {
        let proposed = Path::new(proposed_name);
        let stem = proposed
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(proposed_name);
        let extension = proposed.extension().and_then(|e| e.to_str());

        let mut candidate = self.content_path(proposed_name);
        let mut n = 2;
        while exists_on_disk(&candidate) {
            let name = match extension {
                Some(ext) if !ext.is_empty() => format!("{}({}).{}", stem, n, ext),
                _ => format!("{}({})", stem, n),
            };
            candidate = self.content_path(&name);
            n += 1;
        }
        candidate
    }

    pub fn content_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Moves an external file into this directory under a unique name.
    ///
    /// The listing is not reloaded; call [`reload`](Self::reload) to pick
    /// the new file up.
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DragboxError::InvalidName(source.display().to_string()))?;
        let destination = self.unique_destination(name);
        move_item(source, &destination)?;
        tracing::info!(
            "Imported {} as {}",
            source.display(),
            destination.display()
        );
        Ok(destination)
    }

    /// A fresh collection for the directory entry at `index`, sharing this
    /// collection's pool and settings
    pub fn open_subdirectory(&self, index: usize) -> Option<FileCollection> {
        let entry = self.get(index)?;
        if !entry.is_directory() {
            return None;
        }
        Some(
            FileCollection::new(entry.path(), self.queue.pool())
                .with_thumbnail_size(self.thumbnail_size)
                .with_delete_mode(self.delete_mode),
        )
    }
}

impl Index<usize> for FileCollection {
    type Output = FileEntry;

    /// Panics when `index` is out of bounds; check [`FileCollection::count`] first
    fn index(&self, index: usize) -> &FileEntry {
        &self.entries.as_deref().unwrap_or(&[])[index]
    }
}

impl fmt::Debug for FileCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCollection")
            .field("directory", &self.directory)
            .field("count", &self.count())
            .field("pending_thumbnails", &self.pending_thumbnails.len())
            .field("generation", &self.applied_generation)
            .finish()
    }
}
