//! Catalog data model: sources, series, chapters, pages.
//!
//! A [`Source`] is created once per registered crawler and keeps its
//! identity for the process lifetime; its series collection is replaced
//! wholesale on re-listing, as is each series' chapter collection. Chapters
//! derive their externally observed state from their attached download
//! task, keeping the task as the single source of truth.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::crawler::SourceCrawler;
use crate::downloader::DownloadTask;
use crate::limiter::AdmissionLimiter;
use crate::scheduler::PriorityScheduler;
use crate::types::{ChapterState, PageState, SeriesState, SourceState, chapter_state_for};
use crate::utils::{decode_html_entities, normalize_title};

/// A remote content provider with its own connection budget, scheduler and
/// crawler binding.
pub struct Source {
    name: String,
    base_url: String,
    max_connections: usize,
    state: Mutex<SourceState>,
    pub(crate) limiter: AdmissionLimiter,
    pub(crate) scheduler: PriorityScheduler,
    pub(crate) crawler: Arc<dyn SourceCrawler>,
    series: RwLock<Vec<Arc<Series>>>,
}

impl Source {
    pub(crate) fn new(crawler: Arc<dyn SourceCrawler>, default_max_connections: usize) -> Arc<Self> {
        let max_connections = crawler
            .max_connections()
            .unwrap_or(default_max_connections)
            .max(1);
        Arc::new(Self {
            name: crawler.name().to_string(),
            base_url: crawler.base_url().to_string(),
            max_connections,
            state: Mutex::new(SourceState::Initial),
            limiter: AdmissionLimiter::new(max_connections),
            scheduler: PriorityScheduler::new(max_connections),
            crawler,
            series: RwLock::new(Vec::new()),
        })
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the remote source
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Effective connection cap for this source
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Current lifecycle state
    pub fn state(&self) -> SourceState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, new: SourceState) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::info!(source = %self.name, from = ?*guard, to = ?new, "source state");
        *guard = new;
    }

    /// Snapshot of the source's series.
    pub fn series(&self) -> Vec<Arc<Series>> {
        self.series.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn replace_series(&self, series: Vec<Arc<Series>>) {
        *self.series.write().unwrap_or_else(|e| e.into_inner()) = series;
    }

    /// Find a series of this source by URL.
    pub fn find_series(&self, url: &str) -> Option<Arc<Series>> {
        self.series
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.url() == url)
            .cloned()
    }
}

/// One series of a source.
///
/// Holds a back-reference to its source by name, not by ownership.
pub struct Series {
    source_name: String,
    url: String,
    title: String,
    state: Mutex<SeriesState>,
    chapters: RwLock<Vec<Arc<Chapter>>>,
}

impl Series {
    pub(crate) fn new(source_name: &str, url: &str, title: &str) -> Arc<Self> {
        Arc::new(Self {
            source_name: source_name.to_string(),
            url: decode_html_entities(url),
            title: normalize_title(title),
            state: Mutex::new(SeriesState::Initial),
            chapters: RwLock::new(Vec::new()),
        })
    }

    /// Name of the owning source
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Series page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Normalized series title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current lifecycle state
    pub fn state(&self) -> SeriesState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, new: SeriesState) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::info!(series = %self.title, from = ?*guard, to = ?new, "series state");
        *guard = new;
    }

    /// Snapshot of the series' chapters.
    pub fn chapters(&self) -> Vec<Arc<Chapter>> {
        self.chapters.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn replace_chapters(&self, chapters: Vec<Arc<Chapter>>) {
        *self.chapters.write().unwrap_or_else(|e| e.into_inner()) = chapters;
    }

    /// Chapters not yet marked bookmark-ignored.
    ///
    /// After a bookmark marks the then-known chapters ignored, anything
    /// appearing here arrived in a later listing.
    pub fn new_chapters(&self) -> Vec<Arc<Chapter>> {
        self.chapters()
            .into_iter()
            .filter(|c| !c.bookmark_ignored())
            .collect()
    }
}

/// One chapter of a series.
///
/// The externally observed state is derived: a chapter with an attached
/// task reports the task's state mapped through [`chapter_state_for`];
/// otherwise it reports its own idle state.
pub struct Chapter {
    source_name: String,
    series_title: String,
    url: String,
    title: String,
    bookmark_ignored: AtomicBool,
    previously_downloaded: AtomicBool,
    task: Mutex<Option<Arc<DownloadTask>>>,
}

impl Chapter {
    pub(crate) fn new(source_name: &str, series_title: &str, url: &str, title: &str) -> Arc<Self> {
        Arc::new(Self {
            source_name: source_name.to_string(),
            series_title: series_title.to_string(),
            url: decode_html_entities(url),
            title: normalize_title(title),
            bookmark_ignored: AtomicBool::new(false),
            previously_downloaded: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Name of the owning source
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Title of the owning series
    pub fn series_title(&self) -> &str {
        &self.series_title
    }

    /// Chapter page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Normalized chapter title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Derived chapter state.
    pub fn state(&self) -> ChapterState {
        match self.task() {
            Some(task) => chapter_state_for(task.state()),
            None if self.previously_downloaded.load(Ordering::Acquire) => {
                ChapterState::PreviouslyDownloaded
            }
            None => ChapterState::Initial,
        }
    }

    /// Whether this chapter should be (re)downloaded.
    ///
    /// True for `Error` and `Initial` chapters only. An `Aborted` chapter
    /// is deliberately not download-required; the caller that cancelled it
    /// decides whether to request it again.
    pub fn download_required(&self) -> bool {
        matches!(self.state(), ChapterState::Error | ChapterState::Initial)
    }

    /// The attached download task, if any.
    pub fn task(&self) -> Option<Arc<DownloadTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn attach_task(&self, task: Arc<DownloadTask>) {
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    /// Detach the chapter's task, restoring its idle state.
    pub fn detach_task(&self) {
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Whether the chapter is excluded from new-chapter detection.
    pub fn bookmark_ignored(&self) -> bool {
        self.bookmark_ignored.load(Ordering::Acquire)
    }

    /// Mark or unmark the chapter as bookmark-ignored.
    pub fn set_bookmark_ignored(&self, ignored: bool) {
        self.bookmark_ignored.store(ignored, Ordering::Release);
    }

    /// Record that an earlier run already downloaded this chapter.
    pub fn mark_previously_downloaded(&self) {
        self.previously_downloaded.store(true, Ordering::Release);
    }
}

/// One page of a chapter.
pub struct Page {
    url: String,
    index: usize,
    asset_url: Mutex<Option<String>>,
    state: Mutex<PageState>,
    downloaded: AtomicBool,
    path: Mutex<Option<PathBuf>>,
}

impl Page {
    pub(crate) fn new(index: usize, url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: decode_html_entities(url),
            index,
            asset_url: Mutex::new(None),
            state: Mutex::new(PageState::Initial),
            downloaded: AtomicBool::new(false),
            path: Mutex::new(None),
        })
    }

    /// Page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Zero-based index within the chapter
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current lifecycle state
    pub fn state(&self) -> PageState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, new: PageState) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(page = self.index, from = ?*guard, to = ?new, "page state");
        *guard = new;
    }

    /// Resolved binary-asset URL, once known.
    pub fn asset_url(&self) -> Option<String> {
        self.asset_url.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_asset_url(&self, url: String) {
        *self.asset_url.lock().unwrap_or_else(|e| e.into_inner()) = Some(url);
    }

    /// Whether the page's asset has been persisted.
    pub fn downloaded(&self) -> bool {
        self.downloaded.load(Ordering::Acquire)
    }

    pub(crate) fn mark_downloaded(&self, path: PathBuf) {
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = Some(path);
        self.downloaded.store(true, Ordering::Release);
        self.set_state(PageState::Downloaded);
    }

    /// Local file path once persisted.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.path.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskState;

    fn chapter() -> Arc<Chapter> {
        Chapter::new(
            "mangavault",
            "Series 0",
            "https://mangavault.example/c/1",
            "  Chapter\t1:   The &amp; Sign  ",
        )
    }

    #[test]
    fn chapter_title_is_normalized_at_construction() {
        let chapter = chapter();
        assert_eq!(chapter.title(), "Chapter 1: The & Sign");
    }

    #[test]
    fn chapter_url_entities_are_decoded() {
        let chapter = Chapter::new("s", "t", "https://x.example/c?a=1&amp;b=2", "T");
        assert_eq!(chapter.url(), "https://x.example/c?a=1&b=2");
    }

    #[test]
    fn chapter_without_task_reports_idle_state() {
        let chapter = chapter();
        assert_eq!(chapter.state(), ChapterState::Initial);

        chapter.mark_previously_downloaded();
        assert_eq!(chapter.state(), ChapterState::PreviouslyDownloaded);
    }

    #[test]
    fn chapter_with_task_mirrors_task_state() {
        let chapter = chapter();
        let task = DownloadTask::for_tests("mangavault", "Series 0", chapter.url(), "Chapter 1");
        chapter.attach_task(Arc::clone(&task));

        assert_eq!(chapter.state(), ChapterState::Waiting);
        task.set_state(TaskState::Downloading);
        assert_eq!(chapter.state(), ChapterState::Downloading);

        chapter.detach_task();
        assert_eq!(chapter.state(), ChapterState::Initial);
    }

    #[test]
    fn download_required_for_initial_and_error_only() {
        let chapter = chapter();
        assert!(chapter.download_required(), "Initial chapters need download");

        let task = DownloadTask::for_tests("mangavault", "Series 0", chapter.url(), "Chapter 1");
        chapter.attach_task(Arc::clone(&task));

        task.set_state(TaskState::Error);
        assert!(chapter.download_required());

        task.set_state(TaskState::Downloaded);
        assert!(!chapter.download_required());

        // Aborted is deliberately excluded: cancelling a chapter must not
        // immediately re-flag it for download
        task.set_state(TaskState::Aborted);
        assert!(!chapter.download_required());
    }

    #[test]
    fn new_chapters_excludes_bookmark_ignored() {
        let series = Series::new("mangavault", "https://mangavault.example/s/0", "Series 0");
        let a = Chapter::new("mangavault", "Series 0", "u1", "C1");
        let b = Chapter::new("mangavault", "Series 0", "u2", "C2");
        a.set_bookmark_ignored(true);
        series.replace_chapters(vec![Arc::clone(&a), Arc::clone(&b)]);

        let fresh = series.new_chapters();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].url(), "u2");
    }

    #[test]
    fn page_records_path_and_downloaded_flag_together() {
        let page = Page::new(0, "https://x.example/p/0");
        assert!(!page.downloaded());
        assert_eq!(page.state(), PageState::Initial);

        page.mark_downloaded(PathBuf::from("/tmp/000.png"));
        assert!(page.downloaded());
        assert_eq!(page.state(), PageState::Downloaded);
        assert_eq!(page.file_path(), Some(PathBuf::from("/tmp/000.png")));
    }
}
