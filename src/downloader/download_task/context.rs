//! Download task context — everything one task needs, bundled to reduce
//! parameter passing between the orchestration helpers.

use std::sync::Arc;

use crate::catalog::Source;
use crate::config::RetryConfig;
use crate::limiter::PagePhaseGate;
use crate::transport::{FetchContext, TransportClient};

use super::DownloadTask;

/// Shared context for a single download task.
pub(crate) struct TaskContext {
    pub(crate) task: Arc<DownloadTask>,
    pub(crate) source: Arc<Source>,
    pub(crate) transport: TransportClient,
    pub(crate) retry: RetryConfig,
    pub(crate) page_phase: PagePhaseGate,
}

impl TaskContext {
    /// Fetch context bound to this task's cancellation token and its
    /// source's admission limiter.
    pub(crate) fn fetch_context(&self) -> FetchContext {
        FetchContext::new(
            self.transport.clone(),
            self.source.limiter.clone(),
            self.retry,
            self.task.cancel_token(),
        )
    }
}
