//! Core downloader implementation split into focused submodules.
//!
//! The `MangaDownloader` struct and its methods are organized by domain:
//! - [`listing`] - Series and chapter listing
//! - [`control`] - Task creation, lookup and cancellation
//! - [`download_task`] - Per-chapter download execution

mod control;
pub(crate) mod download_task;
mod listing;

pub use download_task::{DownloadTask, chapter_directory};

use std::sync::{Arc, Mutex};

use crate::bookmarks::{BookmarkStore, Catalog};
use crate::catalog::Source;
use crate::config::Config;
use crate::crawler::CrawlerRegistry;
use crate::error::Result;
use crate::limiter::PagePhaseGate;
use crate::transport::TransportClient;

/// Main downloader instance (cloneable — all fields are Arc-wrapped).
///
/// Owns one [`Source`] per crawler registered at construction, the
/// process-wide page-phase gate, the active-task registry and the bookmark
/// store. Everything it holds is created at startup and torn down together;
/// there is no ambient global state.
#[derive(Clone)]
pub struct MangaDownloader {
    /// Configuration (shared across tasks)
    pub(crate) config: Arc<Config>,
    /// Shared HTTP client
    pub(crate) transport: TransportClient,
    /// Sources, one per registered crawler, in registration order
    pub(crate) sources: Arc<Vec<Arc<Source>>>,
    /// Gate bounding how many tasks run their page phase at once
    pub(crate) page_phase: PagePhaseGate,
    /// Active task registry
    pub(crate) tasks: Arc<Mutex<Vec<Arc<DownloadTask>>>>,
    /// Followed series
    pub(crate) bookmarks: BookmarkStore,
}

impl MangaDownloader {
    /// Create a downloader for the crawlers in `registry`.
    ///
    /// One source is built per registered crawler; each gets its own
    /// admission limiter and scheduler sized to its effective connection
    /// cap.
    pub fn new(
        config: Config,
        registry: &CrawlerRegistry,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        let transport = TransportClient::new(&config.user_agent)?;
        let sources: Vec<Arc<Source>> = registry
            .crawlers()
            .into_iter()
            .map(|crawler| Source::new(crawler, config.max_connections_per_source))
            .collect();

        Ok(Self {
            page_phase: PagePhaseGate::new(config.max_concurrent_tasks),
            config: Arc::new(config),
            transport,
            sources: Arc::new(sources),
            tasks: Arc::new(Mutex::new(Vec::new())),
            bookmarks: BookmarkStore::new(catalog),
        })
    }

    /// All sources, in registration order.
    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<Arc<Source>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    /// The bookmark store.
    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
