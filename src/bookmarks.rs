//! Followed series with copy-on-write semantics.
//!
//! Every mutation builds a new sequence and atomically replaces the visible
//! one, so concurrent readers never observe a half-mutated list: a reader
//! takes a snapshot reference and iterates it without synchronization.
//! Writers serialize with each other on a single mutation lock.
//!
//! Persistence goes through the [`Catalog`] collaborator and happens only
//! at add/remove, never during a download task.

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::catalog::{Series, Source};

/// Serializable form of one bookmark.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    /// Name of the owning source
    pub source: String,
    /// Series page URL
    pub url: String,
    /// Series title
    pub title: String,
}

impl BookmarkEntry {
    fn of(series: &Series) -> Self {
        Self {
            source: series.source_name().to_string(),
            url: series.url().to_string(),
            title: series.title().to_string(),
        }
    }
}

/// Bookmark persistence collaborator.
///
/// Implementations decide where and how bookmarks live; the store calls
/// these only at add/remove time.
pub trait Catalog: Send + Sync {
    /// Load the persisted bookmark entries.
    fn load_bookmarks(&self) -> Vec<BookmarkEntry>;

    /// Persist the given bookmark entries.
    fn save_bookmarks(&self, entries: &[BookmarkEntry]);
}

/// Catalog that persists nothing. Useful for tests and embedders that
/// manage persistence elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCatalog;

impl Catalog for NullCatalog {
    fn load_bookmarks(&self) -> Vec<BookmarkEntry> {
        Vec::new()
    }

    fn save_bookmarks(&self, _entries: &[BookmarkEntry]) {}
}

/// Thread-safe, copy-on-write list of followed series.
#[derive(Clone)]
pub struct BookmarkStore {
    // Serializes writers; never touched by readers
    write_lock: Arc<Mutex<()>>,
    // Atomically swapped immutable snapshot
    snapshot: Arc<RwLock<Arc<Vec<Arc<Series>>>>>,
    catalog: Arc<dyn Catalog>,
}

impl BookmarkStore {
    /// Create an empty store backed by the given catalog.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            write_lock: Arc::new(Mutex::new(())),
            snapshot: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            catalog,
        }
    }

    /// Snapshot of the bookmarked series.
    ///
    /// The returned sequence is immutable; later mutations swap in a new
    /// sequence and never touch this one.
    pub fn list(&self) -> Arc<Vec<Arc<Series>>> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn swap(&self, next: Vec<Arc<Series>>) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
    }

    fn persist(&self) {
        let entries: Vec<BookmarkEntry> = self.list().iter().map(|s| BookmarkEntry::of(s)).collect();
        self.catalog.save_bookmarks(&entries);
    }

    /// Bookmark a series.
    ///
    /// The series' currently known chapters are marked bookmark-ignored so
    /// that only chapters appearing in later listings count as new. Adding
    /// an already bookmarked series is a no-op.
    pub fn add(&self, series: Arc<Series>) {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.list();
        if current
            .iter()
            .any(|s| s.source_name() == series.source_name() && s.url() == series.url())
        {
            return;
        }

        for chapter in series.chapters() {
            chapter.set_bookmark_ignored(true);
        }

        let mut next = current.as_ref().clone();
        next.push(series);
        self.swap(next);
        self.persist();
    }

    /// Remove a bookmarked series.
    pub fn remove(&self, series: &Series) {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let next: Vec<Arc<Series>> = self
            .list()
            .iter()
            .filter(|s| !(s.source_name() == series.source_name() && s.url() == series.url()))
            .cloned()
            .collect();
        self.swap(next);
        self.persist();
    }

    /// Bookmarked series that have chapters not yet marked ignored.
    pub fn series_with_new_chapters(&self) -> Vec<Arc<Series>> {
        self.list()
            .iter()
            .filter(|s| !s.new_chapters().is_empty())
            .cloned()
            .collect()
    }

    /// Reconcile bookmarks of one source after it was re-listed.
    ///
    /// Bookmarks whose series still exist are rebound to the fresh series
    /// objects (so new-chapter detection keeps working); bookmarks whose
    /// series vanished are dropped. Does not persist.
    pub fn retain_existing(&self, source: &Source) {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let next: Vec<Arc<Series>> = self
            .list()
            .iter()
            .filter_map(|s| {
                if s.source_name() != source.name() {
                    return Some(Arc::clone(s));
                }
                source.find_series(s.url())
            })
            .collect();
        self.swap(next);
    }

    /// Replace the whole list with series restored from persistence.
    ///
    /// Called by the embedder at startup after resolving
    /// [`Catalog::load_bookmarks`] entries against live sources. Does not
    /// persist.
    pub fn restore(&self, series: Vec<Arc<Series>>) {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.swap(series);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Chapter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingCatalog {
        saves: AtomicUsize,
    }

    impl Catalog for RecordingCatalog {
        fn load_bookmarks(&self) -> Vec<BookmarkEntry> {
            Vec::new()
        }

        fn save_bookmarks(&self, _entries: &[BookmarkEntry]) {
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn series(url: &str, title: &str) -> Arc<Series> {
        Series::new("mangavault", url, title)
    }

    #[test]
    fn add_marks_known_chapters_ignored_and_persists() {
        let catalog = Arc::new(RecordingCatalog::default());
        let store = BookmarkStore::new(Arc::clone(&catalog) as Arc<dyn Catalog>);

        let s = series("https://x.example/s/0", "Series 0");
        s.replace_chapters(vec![Chapter::new("mangavault", "Series 0", "u1", "C1")]);
        store.add(Arc::clone(&s));

        assert_eq!(store.list().len(), 1);
        assert!(s.chapters()[0].bookmark_ignored());
        assert_eq!(catalog.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn add_is_idempotent_per_source_and_url() {
        let store = BookmarkStore::new(Arc::new(NullCatalog));
        store.add(series("https://x.example/s/0", "Series 0"));
        store.add(series("https://x.example/s/0", "Series 0 retitled"));

        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn remove_drops_only_the_named_series() {
        let store = BookmarkStore::new(Arc::new(NullCatalog));
        let a = series("https://x.example/s/0", "Series 0");
        let b = series("https://x.example/s/1", "Series 1");
        store.add(Arc::clone(&a));
        store.add(Arc::clone(&b));

        store.remove(&a);
        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].url(), "https://x.example/s/1");
    }

    #[test]
    fn readers_keep_their_snapshot_across_mutations() {
        let store = BookmarkStore::new(Arc::new(NullCatalog));
        store.add(series("https://x.example/s/0", "Series 0"));

        let snapshot = store.list();
        store.add(series("https://x.example/s/1", "Series 1"));

        // The earlier snapshot is immutable; only a fresh list() sees the add
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn series_with_new_chapters_reflects_ignored_flags() {
        let store = BookmarkStore::new(Arc::new(NullCatalog));
        let s = series("https://x.example/s/0", "Series 0");
        s.replace_chapters(vec![Chapter::new("mangavault", "Series 0", "u1", "C1")]);
        store.add(Arc::clone(&s));

        // add() marked the known chapter ignored
        assert!(store.series_with_new_chapters().is_empty());

        // A later listing brings a chapter the bookmark has not seen
        let fresh = Chapter::new("mangavault", "Series 0", "u2", "C2");
        let mut chapters = s.chapters();
        chapters.push(fresh);
        s.replace_chapters(chapters);

        assert_eq!(store.series_with_new_chapters().len(), 1);
    }
}
