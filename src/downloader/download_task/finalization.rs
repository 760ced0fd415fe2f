//! Task finalization — resolve the terminal state.

use crate::types::TaskState;

use super::DownloadTask;

/// Resolve a task to its terminal state.
///
/// Reached from the success path and from every failure branch. The state
/// is snapshotted before resolution:
///
/// - if the snapshot is still Waiting, Downloading or Zipping, the task
///   resolves to `Error` when the error flag is set, otherwise to
///   `Downloaded` when every page was downloaded and `Error` when any page
///   is missing;
/// - independently, if the snapshot was not `Downloaded` and cancellation
///   was requested at any point, the final state is forced to `Aborted` —
///   cancellation wins over a partial resolution, and already-completed
///   pages stay counted.
pub(super) fn finalize(task: &DownloadTask, error: bool) {
    let before = task.state();
    tracing::info!(task = %task, state = ?before, error, "finalizing");

    if matches!(
        before,
        TaskState::Waiting | TaskState::Downloading | TaskState::Zipping
    ) {
        if error {
            task.set_state(TaskState::Error);
        } else if task.downloaded_pages() == task.total_pages() {
            task.set_state(TaskState::Downloaded);
        } else {
            task.set_state(TaskState::Error);
        }
    }

    if before != TaskState::Downloaded && task.cancellation_requested() {
        task.set_state(TaskState::Aborted);
    }
}
