//! Core state types for manga-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a download task.
///
/// `Waiting` is the initial state. `Downloaded`, `Error` and `Aborted` are
/// terminal for a given task instance — retrying a chapter creates a new
/// task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Queued, page phase not yet begun
    Waiting,
    /// Listing pages or fetching page assets
    Downloading,
    /// Packaging downloaded pages into the chapter archive
    Zipping,
    /// Every page downloaded (and archived, when requested)
    Downloaded,
    /// The task failed or finished with missing pages
    Error,
    /// Cancellation was requested before the task fully completed
    Aborted,
    /// Deletion was requested while the task was working
    Deleting,
}

impl TaskState {
    /// Returns true while the task still occupies orchestration resources.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            TaskState::Waiting | TaskState::Downloading | TaskState::Deleting | TaskState::Zipping
        )
    }
}

/// Externally observed state of a chapter.
///
/// A chapter with no attached task reports its own idle state (`Initial` or
/// `PreviouslyDownloaded`); a chapter with a task reports the task's state
/// mapped through [`chapter_state_for`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterState {
    /// Never downloaded in this process
    Initial,
    /// Known to have been downloaded by an earlier run
    PreviouslyDownloaded,
    /// Task queued
    Waiting,
    /// Task fetching pages
    Downloading,
    /// Task archiving
    Zipping,
    /// Task finished with every page on disk
    Downloaded,
    /// Task failed
    Error,
    /// Task was cancelled
    Aborted,
    /// Task deletion in progress
    Deleting,
}

/// Pure mapping from a task's state into the chapter-state vocabulary.
///
/// The mapping is strict one-to-one and total: the exhaustive match makes an
/// unmapped task state unrepresentable.
pub fn chapter_state_for(task_state: TaskState) -> ChapterState {
    match task_state {
        TaskState::Waiting => ChapterState::Waiting,
        TaskState::Downloading => ChapterState::Downloading,
        TaskState::Zipping => ChapterState::Zipping,
        TaskState::Downloaded => ChapterState::Downloaded,
        TaskState::Error => ChapterState::Error,
        TaskState::Aborted => ChapterState::Aborted,
        TaskState::Deleting => ChapterState::Deleting,
    }
}

/// Lifecycle state of a source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Not yet listed
    #[default]
    Initial,
    /// Series listing in progress
    Listing,
    /// Series listing completed
    Listed,
    /// Series listing failed
    Error,
}

/// Lifecycle state of a series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesState {
    /// Not yet listed
    #[default]
    Initial,
    /// Chapter listing in progress
    Listing,
    /// Chapter listing completed
    Listed,
    /// Chapter listing failed
    Error,
}

/// Lifecycle state of a single page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    /// Discovered, asset not yet fetched
    #[default]
    Initial,
    /// Asset fetch in progress
    Downloading,
    /// Asset persisted to disk
    Downloaded,
    /// Asset fetch or persistence failed
    Error,
}

/// Serializable descriptor of a download task.
///
/// Captures names rather than live references so the task survives catalog
/// reorganization; used by external collaborators for persistence/resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Name of the owning source
    pub source: String,
    /// Title of the owning series
    pub series: String,
    /// Normalized chapter title
    pub chapter: String,
    /// Chapter URL
    pub url: String,
    /// Computed output directory for page files
    pub output_dir: PathBuf,
    /// Whether the chapter is archived after download
    pub archive: bool,
}
