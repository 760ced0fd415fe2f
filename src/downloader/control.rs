//! Task creation, lookup and cancellation.

use std::sync::Arc;

use crate::catalog::Chapter;
use crate::error::{Error, Result};

use super::download_task::{DownloadTask, TaskContext, run_download_task};
use super::MangaDownloader;

impl MangaDownloader {
    /// Request a chapter download.
    ///
    /// Creates a task, attaches it to the chapter, registers it and spawns
    /// its orchestration. If the chapter already has a working task, that
    /// task is returned instead (idempotent); a chapter whose previous task
    /// reached a terminal state gets a fresh task.
    pub fn download_chapter(&self, chapter: &Arc<Chapter>, archive: bool) -> Result<Arc<DownloadTask>> {
        if let Some(existing) = chapter.task()
            && existing.is_working()
        {
            tracing::debug!(task = %existing, "download already in progress");
            return Ok(existing);
        }

        let source = self
            .source(chapter.source_name())
            .ok_or_else(|| Error::UnknownSource(chapter.source_name().to_string()))?;

        let task = DownloadTask::new(chapter, &self.config.download_dir, archive);
        chapter.attach_task(Arc::clone(&task));
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&task));

        let ctx = TaskContext {
            task: Arc::clone(&task),
            source,
            transport: self.transport.clone(),
            retry: self.config.retry,
            page_phase: self.page_phase.clone(),
        };
        tokio::spawn(run_download_task(ctx));

        Ok(task)
    }

    /// Snapshot of the task registry.
    pub fn tasks(&self) -> Vec<Arc<DownloadTask>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Find the registered task for a chapter, if any.
    pub fn find_task(&self, chapter: &Chapter) -> Option<Arc<DownloadTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.source_name() == chapter.source_name() && t.chapter_url() == chapter.url())
            .cloned()
    }

    /// Remove a task from the registry.
    ///
    /// The task itself is unaffected; callers that also want the chapter to
    /// report its idle state again detach it there.
    pub fn remove_task(&self, task: &Arc<DownloadTask>) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|t| !Arc::ptr_eq(t, task));
    }

    /// Signal cancellation to every working task.
    ///
    /// Cancellation stays cooperative: in-flight transport calls run to
    /// completion and each task resolves to `Aborted` through its own
    /// finalization.
    pub fn cancel_all(&self) {
        for task in self.tasks() {
            if task.is_working() {
                task.request_deletion();
            }
        }
    }
}
