//! Download task orchestration — top-level lifecycle for a single chapter.
//!
//! Phases, in strict order:
//! 1. Register with the page-phase gate (aborts immediately if cancelled)
//! 2. Bail out if cancellation is already pending
//! 3. Transition to Downloading, list the chapter's pages
//! 4. Fan out page downloads over the source's pages lane
//! 5. Re-check cancellation
//! 6. Package the archive when requested
//! 7. Finalize; the gate registration is released on every exit path

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};

use crate::archive;
use crate::catalog::Page;
use crate::crawler::SourceCrawler;
use crate::error::{Error, Result};
use crate::scheduler::Lane;
use crate::transport::FetchContext;
use crate::types::{PageState, TaskState};

use super::context::TaskContext;
use super::finalization::finalize;

/// Run one chapter download to its terminal state.
///
/// Never returns an error: every failure is absorbed into the task's
/// terminal state, which is the only failure channel crossing the task
/// boundary.
pub(crate) async fn run_download_task(ctx: TaskContext) {
    let task = Arc::clone(&ctx.task);
    let token = task.cancel_token();

    // Phase 1: page-phase registration, held for the task's whole lifetime
    let _registration = match ctx.page_phase.register(&token).await {
        Ok(slot) => slot,
        Err(_) => {
            tracing::info!(task = %task, "cancelled during page-phase registration");
            finalize(&task, true);
            return;
        }
    };

    match download_chapter(&ctx).await {
        Ok(()) => finalize(&task, false),
        Err(e) => {
            if e.is_cancelled() {
                tracing::info!(task = %task, state = ?task.state(), "cancellation observed");
            } else {
                tracing::warn!(task = %task, state = ?task.state(), error = %e, "task failed");
            }
            finalize(&task, true);
        }
    }
}

/// Phases 2-6; any error propagates to the caller's finalization.
async fn download_chapter(ctx: &TaskContext) -> Result<()> {
    let task = &ctx.task;
    let token = task.cancel_token();

    // Phase 2: nothing may mutate to Downloading under pending cancellation
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Phase 3: list pages through the listing lane
    task.set_state(TaskState::Downloading);
    let fetch = ctx.fetch_context();

    let entries = {
        let _lane = ctx.source.scheduler.enter(Lane::Listing, &token).await?;
        ctx.source
            .crawler
            .list_pages(&fetch, task.chapter_url())
            .await?
    };

    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let pages: Vec<Arc<Page>> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| Page::new(index, &entry.url))
        .collect();
    task.set_pages(pages.clone());

    tokio::fs::create_dir_all(task.output_dir())
        .await
        .map_err(|e| Error::OutputDir {
            path: task.output_dir().to_path_buf(),
            reason: e.to_string(),
        })?;

    // Phase 4: bounded page fan-out
    fan_out_pages(ctx, &fetch, &pages).await?;

    // Phase 5
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Phase 6
    if task.archive() {
        task.set_state(TaskState::Zipping);
        let files: Vec<_> = pages.iter().filter_map(|p| p.file_path()).collect();
        if !files.is_empty() {
            archive::package_chapter(task.output_dir(), &files, &token)?;
        }
    }

    Ok(())
}

/// Download every page, at most `pages_width` in flight at once.
///
/// A page observing cancellation stops further dispatch but lets
/// already-started downloads finish; a non-cancellation page failure stops
/// dispatch and fails the whole task with the first such error.
async fn fan_out_pages(ctx: &TaskContext, fetch: &FetchContext, pages: &[Arc<Page>]) -> Result<()> {
    let token = ctx.task.cancel_token();
    let stop = Arc::new(AtomicBool::new(false));
    let first_failure: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
    let width = ctx.source.scheduler.pages_width();

    stream::iter(pages.to_vec())
        .map(|page| {
            let crawler = Arc::clone(&ctx.source.crawler);
            let scheduler = ctx.source.scheduler.clone();
            let fetch = fetch.clone();
            let token = token.clone();
            let stop = Arc::clone(&stop);
            let first_failure = Arc::clone(&first_failure);
            let output_dir = ctx.task.output_dir().to_path_buf();

            async move {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                let _lane = match scheduler.enter(Lane::Pages, &token).await {
                    Ok(slot) => slot,
                    Err(_) => {
                        stop.store(true, Ordering::SeqCst);
                        return;
                    }
                };
                if stop.load(Ordering::SeqCst) {
                    return;
                }

                match download_page(crawler.as_ref(), &fetch, &page, &output_dir).await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {
                        tracing::info!(page = page.index(), "page cancelled, stopping dispatch");
                        stop.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::warn!(page = page.index(), error = %e, "page failed, stopping dispatch");
                        page.set_state(PageState::Error);
                        stop.store(true, Ordering::SeqCst);
                        let mut slot = first_failure.lock().unwrap_or_else(|e| e.into_inner());
                        if slot.is_none() {
                            *slot = Some(Error::Page {
                                index: page.index(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        })
        .buffer_unordered(width.max(1))
        .collect::<Vec<()>>()
        .await;

    if let Some(e) = first_failure
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
    {
        return Err(e);
    }
    Ok(())
}

/// Resolve and persist one page's asset.
async fn download_page(
    crawler: &dyn SourceCrawler,
    fetch: &FetchContext,
    page: &Arc<Page>,
    output_dir: &Path,
) -> Result<()> {
    page.set_state(PageState::Downloading);

    let asset_url = match page.asset_url() {
        Some(url) => url,
        None => {
            let url = crawler.resolve_asset_url(fetch, page.url()).await?;
            page.set_asset_url(url.clone());
            url
        }
    };

    let bytes = crawler.fetch_asset(fetch, &asset_url, page.url()).await?;

    let path = output_dir.join(format!("{:03}.{}", page.index(), asset_extension(&asset_url)));
    tokio::fs::write(&path, &bytes).await?;
    page.mark_downloaded(path);
    Ok(())
}

/// Extension of the asset's final path segment; "jpg" when unknown.
fn asset_extension(asset_url: &str) -> String {
    url::Url::parse(asset_url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .next_back()?
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
        })
        .filter(|ext| !ext.is_empty() && ext.len() <= 4)
        .unwrap_or_else(|| "jpg".to_string())
}
