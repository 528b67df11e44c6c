use super::FileEntry;
use crate::error::DragboxError;

/// Receives listing changes from a [`FileCollection`](super::FileCollection).
///
/// Callbacks run on the thread that owns the collection, from inside
/// `reload`, `rename`, `remove` or event processing.
pub trait CollectionObserver {
    /// The whole listing was replaced and now holds `count` entries.
    fn reloaded(&self, count: usize);

    /// The entry at `index` changed (renamed or thumbnail arrived).
    fn updated(&self, index: usize);

    /// The entry at `index` was removed from the listing.
    fn removed(&self, _index: usize) {}

    /// Enumeration failed; `reloaded(0)` follows.
    fn reload_failed(&self, _error: &DragboxError) {}
}

/// Receives per-entry edit-mode toggles.
pub trait EntryObserver {
    fn edit_mode_changed(&self, entry: &FileEntry);
}
