//! Chapter download task — state machine and orchestration.
//!
//! Split into focused submodules:
//! - [`context`] - Shared per-task state bundle
//! - [`orchestration`] - Top-level task lifecycle and page fan-out
//! - [`finalization`] - Terminal-state resolution

mod context;
mod finalization;
mod orchestration;

pub(crate) use context::TaskContext;
pub(crate) use orchestration::run_download_task;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;

use crate::catalog::{Chapter, Page};
use crate::types::{TaskDescriptor, TaskState};
use crate::utils::sanitize_path_component;

/// Deterministic output directory for a chapter:
/// `<root>/<source>/<series>/<chapter>`, with filesystem-invalid
/// characters stripped from each component.
pub fn chapter_directory(root: &Path, source: &str, series: &str, chapter: &str) -> PathBuf {
    root.join(sanitize_path_component(source))
        .join(sanitize_path_component(series))
        .join(sanitize_path_component(chapter))
}

/// The unit of orchestration: one chapter's download lifecycle.
///
/// Captures its owning source and series by name, not by live reference,
/// so it survives catalog reorganization. Owns its cancellation source;
/// requesting cancellation affects only this task and its page downloads.
pub struct DownloadTask {
    source_name: String,
    series_title: String,
    chapter_title: String,
    chapter_url: String,
    output_dir: PathBuf,
    archive: bool,
    pages: RwLock<Vec<Arc<Page>>>,
    state: Mutex<TaskState>,
    cancel: CancellationToken,
}

impl DownloadTask {
    pub(crate) fn new(chapter: &Chapter, download_root: &Path, archive: bool) -> Arc<Self> {
        Arc::new(Self {
            source_name: chapter.source_name().to_string(),
            series_title: chapter.series_title().to_string(),
            chapter_title: chapter.title().to_string(),
            chapter_url: chapter.url().to_string(),
            output_dir: chapter_directory(
                download_root,
                chapter.source_name(),
                chapter.series_title(),
                chapter.title(),
            ),
            archive,
            pages: RwLock::new(Vec::new()),
            state: Mutex::new(TaskState::Waiting),
            cancel: CancellationToken::new(),
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

    /// Normalized chapter title
    pub fn chapter_title(&self) -> &str {
        &self.chapter_title
    }

    /// Chapter page URL
    pub fn chapter_url(&self) -> &str {
        &self.chapter_url
    }

    /// Directory the page files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether the chapter is packaged into an archive after download
    pub fn archive(&self) -> bool {
        self.archive
    }

    /// Serializable descriptor for persistence/resume collaborators.
    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            source: self.source_name.clone(),
            series: self.series_title.clone(),
            chapter: self.chapter_title.clone(),
            url: self.chapter_url.clone(),
            output_dir: self.output_dir.clone(),
            archive: self.archive,
        }
    }

    /// Current task state.
    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, new: TaskState) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::info!(task = %self, from = ?*guard, to = ?new, "task state");
        *guard = new;
    }

    /// True while the task still occupies orchestration resources.
    pub fn is_working(&self) -> bool {
        self.state().is_working()
    }

    /// Snapshot of the pages actually fetched for this chapter.
    pub fn pages(&self) -> Vec<Arc<Page>> {
        self.pages.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_pages(&self, pages: Vec<Arc<Page>>) {
        *self.pages.write().unwrap_or_else(|e| e.into_inner()) = pages;
    }

    /// Total number of pages listed for the chapter.
    pub fn total_pages(&self) -> usize {
        self.pages.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of pages whose assets are persisted.
    ///
    /// Never exceeds [`total_pages`](Self::total_pages).
    pub fn downloaded_pages(&self) -> usize {
        self.pages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|p| p.downloaded())
            .count()
    }

    /// Human-readable progress string.
    pub fn progress(&self) -> String {
        match self.state() {
            TaskState::Error => "error".to_string(),
            TaskState::Aborted => "aborted".to_string(),
            TaskState::Waiting => "waiting".to_string(),
            TaskState::Deleting => "deleting".to_string(),
            TaskState::Downloaded => "downloaded".to_string(),
            TaskState::Zipping => "zipping".to_string(),
            TaskState::Downloading => {
                format!("{}/{}", self.downloaded_pages(), self.total_pages())
            }
        }
    }

    /// Request deletion of the task's work.
    ///
    /// Callable from any thread at any time. If the task is working
    /// (Waiting, Downloading or Zipping), its cancellation source is
    /// signalled and the state moves to `Deleting`; otherwise this is a
    /// no-op.
    pub fn request_deletion(&self) {
        let state = self.state();
        if matches!(
            state,
            TaskState::Waiting | TaskState::Downloading | TaskState::Zipping
        ) {
            tracing::info!(task = %self, ?state, "deletion requested, cancelling");
            self.cancel.cancel();
            self.set_state(TaskState::Deleting);
        }
    }

    /// Whether cancellation has been requested for this task.
    pub fn cancellation_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(source: &str, series: &str, url: &str, chapter: &str) -> Arc<Self> {
        Arc::new(Self {
            source_name: source.to_string(),
            series_title: series.to_string(),
            chapter_title: chapter.to_string(),
            chapter_url: url.to_string(),
            output_dir: chapter_directory(Path::new("./downloads"), source, series, chapter),
            archive: false,
            pages: RwLock::new(Vec::new()),
            state: Mutex::new(TaskState::Waiting),
            cancel: CancellationToken::new(),
        })
    }
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.source_name, self.series_title, self.chapter_title
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Arc<DownloadTask> {
        DownloadTask::for_tests("vault", "Series 0", "fake://vault/c/0", "Chapter 0")
    }

    #[test]
    fn new_task_waits() {
        let task = task();
        assert_eq!(task.state(), TaskState::Waiting);
        assert!(task.is_working());
        assert!(!task.cancellation_requested());
    }

    #[test]
    fn chapter_directory_strips_invalid_characters() {
        let dir = chapter_directory(
            Path::new("/data"),
            "vault",
            "What: a series?",
            "Chapter 1/2",
        );
        assert_eq!(dir, PathBuf::from("/data/vault/What a series/Chapter 12"));
    }

    #[test]
    fn downloaded_pages_never_exceed_total() {
        let task = task();
        let pages: Vec<_> = (0..4).map(|i| Page::new(i, &format!("u{i}"))).collect();
        task.set_pages(pages.clone());

        for page in &pages {
            page.mark_downloaded(PathBuf::from(format!("/tmp/{:03}.png", page.index())));
            assert!(task.downloaded_pages() <= task.total_pages());
        }
        assert_eq!(task.downloaded_pages(), 4);
    }

    #[test]
    fn progress_shows_counts_while_downloading() {
        let task = task();
        let pages: Vec<_> = (0..5).map(|i| Page::new(i, &format!("u{i}"))).collect();
        task.set_pages(pages.clone());
        task.set_state(TaskState::Downloading);

        pages[0].mark_downloaded(PathBuf::from("/tmp/000.png"));
        pages[1].mark_downloaded(PathBuf::from("/tmp/001.png"));
        assert_eq!(task.progress(), "2/5");

        task.set_state(TaskState::Zipping);
        assert_eq!(task.progress(), "zipping");
    }

    #[test]
    fn request_deletion_cancels_working_task_and_shows_deleting() {
        let task = task();
        task.set_state(TaskState::Downloading);

        task.request_deletion();
        assert!(task.cancellation_requested());
        assert_eq!(task.state(), TaskState::Deleting);
        assert!(task.is_working(), "Deleting still counts as working");
    }

    #[test]
    fn request_deletion_on_terminal_task_is_a_no_op() {
        let task = task();
        task.set_state(TaskState::Downloaded);

        task.request_deletion();
        assert!(!task.cancellation_requested());
        assert_eq!(task.state(), TaskState::Downloaded);
    }

    #[test]
    fn descriptor_captures_names_not_references() {
        let task = task();
        let descriptor = task.descriptor();
        assert_eq!(descriptor.source, "vault");
        assert_eq!(descriptor.series, "Series 0");
        assert_eq!(descriptor.chapter, "Chapter 0");
        assert!(!descriptor.archive);
    }
}
