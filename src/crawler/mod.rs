//! Source crawler abstraction.
//!
//! One [`SourceCrawler`] implementation exists per remote source. The
//! orchestrator only ever talks to the trait: enumerate series, enumerate
//! chapters, enumerate pages, resolve a page's image URL, fetch the image
//! bytes. Implementations receive a [`FetchContext`] and are expected to
//! perform all network I/O through it, so admission control, retry and
//! cancellation apply uniformly regardless of the site being scraped.
//!
//! Implementations are made known to the orchestrator through the
//! [`CrawlerRegistry`] by explicit registration at startup.

mod registry;

pub mod fake;

pub use registry::CrawlerRegistry;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::FetchContext;

/// A series discovered while listing a source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesEntry {
    /// Series page URL
    pub url: String,
    /// Series title as scraped (normalized later by the catalog)
    pub title: String,
}

/// A chapter discovered while listing a series
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterEntry {
    /// Chapter page URL
    pub url: String,
    /// Chapter title as scraped (normalized later by the catalog)
    pub title: String,
}

/// A page discovered while listing a chapter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageEntry {
    /// Page URL (the HTML page embedding the image)
    pub url: String,
}

/// Scraping capability set implemented once per remote source.
///
/// All operations are cancellation-aware through the fetch context's token
/// and draw admission permits from the source's shared pool.
#[async_trait]
pub trait SourceCrawler: Send + Sync {
    /// Unique source name (registry key, directory component)
    fn name(&self) -> &str;

    /// Base URL of the remote source
    fn base_url(&self) -> &str;

    /// Connection cap override for this source.
    ///
    /// `None` uses the configured
    /// [`max_connections_per_source`](crate::Config::max_connections_per_source).
    fn max_connections(&self) -> Option<usize> {
        None
    }

    /// Enumerate the series the source offers.
    async fn list_series(&self, fetch: &FetchContext) -> Result<Vec<SeriesEntry>>;

    /// Enumerate the chapters of one series.
    async fn list_chapters(&self, fetch: &FetchContext, series_url: &str)
    -> Result<Vec<ChapterEntry>>;

    /// Enumerate the pages of one chapter.
    async fn list_pages(&self, fetch: &FetchContext, chapter_url: &str) -> Result<Vec<PageEntry>>;

    /// Resolve the binary-asset URL for one page.
    async fn resolve_asset_url(&self, fetch: &FetchContext, page_url: &str) -> Result<String>;

    /// Fetch a page's image bytes.
    ///
    /// The default implementation streams through the fetch context
    /// (admission permit, retry, per-chunk cancellation, referer header).
    /// Test crawlers override this to serve synthetic bytes while still
    /// drawing a permit.
    async fn fetch_asset(
        &self,
        fetch: &FetchContext,
        asset_url: &str,
        referer: &str,
    ) -> Result<Vec<u8>> {
        fetch.asset(asset_url, referer).await
    }
}
