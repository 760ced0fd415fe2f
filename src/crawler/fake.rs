//! Deterministic in-process crawler for tests and embedding experiments.
//!
//! Simulates a remote source without network access: configurable latency,
//! artificially slow listing operations, empty result sets and an
//! overridden connection cap. Every operation still draws a permit from the
//! source's admission limiter, so the scheduler, limiter and task state
//! machine are exercised exactly as with a real source. An
//! [`InFlightGauge`] records how many operations held a permit
//! concurrently, which lets tests assert the connection cap.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::FetchContext;

use super::{ChapterEntry, PageEntry, SeriesEntry, SourceCrawler};

/// High-water mark of concurrently held permits.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Operations currently holding a permit.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held concurrently.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Behavior knobs for a [`FakeCrawler`]
#[derive(Clone, Debug)]
pub struct FakeCrawlerConfig {
    /// Source name (registry key)
    pub name: String,
    /// Simulated time per operation
    pub base_latency: Duration,
    /// Listing operations take four times the base latency
    pub slow_listing: bool,
    /// All listings return empty result sets
    pub empty: bool,
    /// Connection cap override for this source
    pub max_connections: Option<usize>,
    /// Number of series the source offers
    pub series_count: usize,
    /// Number of chapters per series
    pub chapters_per_series: usize,
    /// Number of pages per chapter
    pub pages_per_chapter: usize,
    /// Asset fetches for this page index fail deterministically
    pub fail_page: Option<usize>,
}

impl Default for FakeCrawlerConfig {
    fn default() -> Self {
        Self {
            name: "fake".to_string(),
            base_latency: Duration::from_millis(5),
            slow_listing: false,
            empty: false,
            max_connections: None,
            series_count: 2,
            chapters_per_series: 3,
            pages_per_chapter: 5,
            fail_page: None,
        }
    }
}

/// Simulated source crawler
pub struct FakeCrawler {
    config: FakeCrawlerConfig,
    base_url: String,
    gauge: Arc<InFlightGauge>,
}

impl FakeCrawler {
    /// Create a fake crawler with the given behavior.
    pub fn new(config: FakeCrawlerConfig) -> Self {
        let base_url = format!("fake://{}", config.name);
        Self {
            config,
            base_url,
            gauge: Arc::new(InFlightGauge::default()),
        }
    }

    /// Convenience constructor with default behavior.
    pub fn named(name: &str) -> Self {
        Self::new(FakeCrawlerConfig {
            name: name.to_string(),
            ..FakeCrawlerConfig::default()
        })
    }

    /// The permit gauge shared with all of this crawler's operations.
    pub fn gauge(&self) -> Arc<InFlightGauge> {
        Arc::clone(&self.gauge)
    }

    fn listing_latency(&self) -> Duration {
        if self.config.slow_listing {
            self.config.base_latency * 4
        } else {
            self.config.base_latency
        }
    }

    /// Hold a permit for `latency`, tracking the gauge, then check the
    /// token once the simulated round trip completes.
    async fn simulate_io(&self, fetch: &FetchContext, latency: Duration) -> Result<()> {
        let _permit = fetch.limiter().acquire(fetch.token()).await?;
        self.gauge.enter();
        tokio::time::sleep(latency).await;
        self.gauge.exit();
        if fetch.token().is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl SourceCrawler for FakeCrawler {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn max_connections(&self) -> Option<usize> {
        self.config.max_connections
    }

    async fn list_series(&self, fetch: &FetchContext) -> Result<Vec<SeriesEntry>> {
        self.simulate_io(fetch, self.listing_latency()).await?;
        if self.config.empty {
            return Ok(Vec::new());
        }
        Ok((0..self.config.series_count)
            .map(|s| SeriesEntry {
                url: format!("{}/series/{s}", self.base_url),
                title: format!("Series {s}"),
            })
            .collect())
    }

    async fn list_chapters(
        &self,
        fetch: &FetchContext,
        series_url: &str,
    ) -> Result<Vec<ChapterEntry>> {
        self.simulate_io(fetch, self.listing_latency()).await?;
        if self.config.empty {
            return Ok(Vec::new());
        }
        Ok((0..self.config.chapters_per_series)
            .map(|c| ChapterEntry {
                url: format!("{series_url}/chapter/{c}"),
                title: format!("Chapter {c}"),
            })
            .collect())
    }

    async fn list_pages(&self, fetch: &FetchContext, chapter_url: &str) -> Result<Vec<PageEntry>> {
        self.simulate_io(fetch, self.listing_latency()).await?;
        if self.config.empty {
            return Ok(Vec::new());
        }
        Ok((0..self.config.pages_per_chapter)
            .map(|p| PageEntry {
                url: format!("{chapter_url}/page/{p}"),
            })
            .collect())
    }

    async fn resolve_asset_url(&self, fetch: &FetchContext, page_url: &str) -> Result<String> {
        self.simulate_io(fetch, self.config.base_latency).await?;
        Ok(format!("{page_url}/image.png"))
    }

    async fn fetch_asset(
        &self,
        fetch: &FetchContext,
        asset_url: &str,
        _referer: &str,
    ) -> Result<Vec<u8>> {
        self.simulate_io(fetch, self.config.base_latency).await?;

        if let Some(fail_index) = self.config.fail_page
            && asset_url.contains(&format!("/page/{fail_index}/"))
        {
            return Err(Error::Io(std::io::Error::other(
                "simulated asset failure",
            )));
        }

        // Tiny deterministic payload; content is irrelevant to the engine
        Ok(asset_url.as_bytes().to_vec())
    }
}
