//! # manga-dl
//!
//! Embeddable backend library for manga download applications.
//!
//! ## Design Philosophy
//!
//! manga-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Source-bounded** - Every network operation against a source draws
//!   from that source's connection budget, whatever its granularity
//! - **Cooperatively cancellable** - Cancellation is a signal checked at
//!   well-defined points, never a preemption
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use manga_dl::crawler::fake::FakeCrawler;
//! use manga_dl::{CancellationToken, Config, CrawlerRegistry, MangaDownloader, NullCatalog};
//!
//! #[tokio::main]
//! async fn main() -> manga_dl::Result<()> {
//!     let mut registry = CrawlerRegistry::new();
//!     registry.register(Arc::new(FakeCrawler::named("demo")));
//!
//!     let downloader = MangaDownloader::new(Config::default(), &registry, Arc::new(NullCatalog))?;
//!     let source = downloader.source("demo").expect("registered above");
//!
//!     let token = CancellationToken::new();
//!     let series = downloader.list_series(&source, &token).await?;
//!     let chapters = downloader.list_chapters(&series[0], &token).await?;
//!
//!     let task = downloader.download_chapter(&chapters[0], true)?;
//!     while task.is_working() {
//!         println!("{}", task.progress());
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Chapter archive packaging
pub mod archive;
/// Followed series with copy-on-write semantics
pub mod bookmarks;
/// Catalog data model (sources, series, chapters, pages)
pub mod catalog;
/// Configuration types
pub mod config;
/// Source crawler abstraction and registry
pub mod crawler;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Admission control (per-source permits, page-phase gate)
pub mod limiter;
/// Retry logic for transport failures
pub mod retry;
/// Per-source execution lanes
pub mod scheduler;
/// HTTP fetch primitives
pub mod transport;
/// Core state types
pub mod types;
/// Path and title helpers
pub mod utils;

// Re-export commonly used types
pub use bookmarks::{BookmarkEntry, BookmarkStore, Catalog, NullCatalog};
pub use catalog::{Chapter, Page, Series, Source};
pub use config::{Config, RetryConfig};
pub use crawler::{ChapterEntry, CrawlerRegistry, PageEntry, SeriesEntry, SourceCrawler};
pub use downloader::{DownloadTask, MangaDownloader, chapter_directory};
pub use error::{Error, Result};
pub use limiter::{AdmissionLimiter, AdmissionPermit, PagePhaseGate};
pub use scheduler::{Lane, PriorityScheduler};
pub use transport::{FetchContext, TransportClient};
pub use types::{
    ChapterState, PageState, SeriesState, SourceState, TaskDescriptor, TaskState,
    chapter_state_for,
};

// Cancellation is part of the public API surface
pub use tokio_util::sync::CancellationToken;

/// Helper to run until a termination signal, then cancel all tasks.
///
/// Waits for SIGTERM/SIGINT (Ctrl+C elsewhere), signals cancellation to
/// every working task and waits for them to reach a terminal state.
pub async fn run_until_shutdown(downloader: MangaDownloader) {
    wait_for_signal().await;
    downloader.cancel_all();

    // Cancellation is cooperative; give tasks time to finalize
    while downloader.tasks().iter().any(|t| t.is_working()) {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        _ => {
            tracing::warn!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}
