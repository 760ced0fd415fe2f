//! Series and chapter listing.
//!
//! Listing operations run on the source's listing lane, draw admission
//! permits from the same pool as page-image traffic, and replace the
//! listed collection wholesale on success.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::catalog::{Chapter, Series, Source};
use crate::error::{Error, Result};
use crate::scheduler::Lane;
use crate::transport::FetchContext;
use crate::types::{SeriesState, SourceState};

use super::MangaDownloader;

impl MangaDownloader {
    fn fetch_context(&self, source: &Source, token: &CancellationToken) -> FetchContext {
        FetchContext::new(
            self.transport.clone(),
            source.limiter.clone(),
            self.config.retry,
            token.clone(),
        )
    }

    /// List (or re-list) the series a source offers.
    ///
    /// On success the source's series collection is replaced and bookmarks
    /// of this source are reconciled against the fresh listing.
    pub async fn list_series(
        &self,
        source: &Arc<Source>,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<Series>>> {
        source.set_state(SourceState::Listing);
        let fetch = self.fetch_context(source, token);

        let listed = async {
            let _lane = source.scheduler.enter(Lane::Listing, token).await?;
            source.crawler.list_series(&fetch).await
        }
        .await;

        match listed {
            Ok(entries) => {
                let series: Vec<Arc<Series>> = entries
                    .iter()
                    .map(|e| Series::new(source.name(), &e.url, &e.title))
                    .collect();
                source.replace_series(series.clone());
                source.set_state(SourceState::Listed);
                self.bookmarks.retain_existing(source);
                Ok(series)
            }
            Err(e) => {
                source.set_state(SourceState::Error);
                Err(e)
            }
        }
    }

    /// List (or re-list) the chapters of a series.
    pub async fn list_chapters(
        &self,
        series: &Arc<Series>,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<Chapter>>> {
        let source = self
            .source(series.source_name())
            .ok_or_else(|| Error::UnknownSource(series.source_name().to_string()))?;

        series.set_state(SeriesState::Listing);
        let fetch = self.fetch_context(&source, token);

        let listed = async {
            let _lane = source.scheduler.enter(Lane::Listing, token).await?;
            source.crawler.list_chapters(&fetch, series.url()).await
        }
        .await;

        match listed {
            Ok(entries) => {
                let chapters: Vec<Arc<Chapter>> = entries
                    .iter()
                    .map(|e| Chapter::new(source.name(), series.title(), &e.url, &e.title))
                    .collect();
                series.replace_chapters(chapters.clone());
                series.set_state(SeriesState::Listed);
                Ok(chapters)
            }
            Err(e) => {
                series.set_state(SeriesState::Error);
                Err(e)
            }
        }
    }
}
