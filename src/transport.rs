//! HTTP fetch primitives.
//!
//! All network I/O in the crate flows through [`FetchContext`], which
//! stitches together the per-source admission limiter, the retry wrapper
//! and the shared HTTP client:
//!
//! - document fetches invoke a state-transition hook, acquire a permit, run
//!   the GET through retry, and check cancellation once the round trip
//!   completes (never mid-flight);
//! - asset fetches stream the response body chunkwise into memory, checking
//!   cancellation once per chunk so a large image can be interrupted
//!   between reads.
//!
//! Permits are RAII guards: release is guaranteed on every exit path.

use reqwest::StatusCode;
use reqwest::header::REFERER;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::limiter::AdmissionLimiter;
use crate::retry::with_retry;

/// Shared HTTP client with the crate's transport policy applied
/// (custom user-agent, automatic gzip decompression).
#[derive(Clone)]
pub struct TransportClient {
    client: reqwest::Client,
}

impl TransportClient {
    /// Build a client sending `user_agent` with every request.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    /// One GET attempt for an HTML/text document.
    ///
    /// 404 is a valid non-error outcome reported as `Ok(None)`; other
    /// non-success statuses are transport failures.
    async fn get_document(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(url, "document not found");
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.text().await?))
    }

    /// One GET attempt for a binary asset, streamed chunkwise.
    ///
    /// The page URL travels as the referer header. Cancellation is checked
    /// once per received chunk.
    async fn get_asset(
        &self,
        asset_url: &str,
        referer: &str,
        token: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(asset_url)
            .header(REFERER, referer)
            .send()
            .await?
            .error_for_status()?;

        let mut buffer = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            if token.is_cancelled() {
                tracing::info!(asset_url, "cancellation observed mid-stream");
                return Err(Error::Cancelled);
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}

/// Bundle of everything a fetch needs: transport, the source's limiter,
/// retry policy and the cancellation token of the requesting operation.
///
/// Crawler implementations receive a `FetchContext` so that every scraping
/// operation goes through the orchestrated path.
#[derive(Clone)]
pub struct FetchContext {
    transport: TransportClient,
    limiter: AdmissionLimiter,
    retry: RetryConfig,
    token: CancellationToken,
}

impl FetchContext {
    /// Assemble a fetch context.
    pub fn new(
        transport: TransportClient,
        limiter: AdmissionLimiter,
        retry: RetryConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            transport,
            limiter,
            retry,
            token,
        }
    }

    /// The cancellation token the context observes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The source's admission limiter.
    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    /// Fetch a document, invoking `on_start` (a state-transition hook)
    /// before acquiring a permit.
    ///
    /// `Ok(None)` means the document does not exist; it is never retried.
    /// If cancellation is pending after a successful round trip, the call
    /// fails with [`Error::Cancelled`] instead of returning the document.
    pub async fn document_with_hook(
        &self,
        url: &str,
        on_start: impl FnOnce(),
    ) -> Result<Option<String>> {
        on_start();
        let _permit = self.limiter.acquire(&self.token).await?;
        let document = with_retry(&self.retry, || self.transport.get_document(url)).await?;
        if self.token.is_cancelled() {
            tracing::info!(url, "cancellation observed after document fetch");
            return Err(Error::Cancelled);
        }
        Ok(document)
    }

    /// Fetch a document with no state-transition hook.
    pub async fn document(&self, url: &str) -> Result<Option<String>> {
        self.document_with_hook(url, || {}).await
    }

    /// Fetch a binary asset into memory, with the owning page's URL as
    /// referer. Same acquire/retry/release shape as document fetches.
    pub async fn asset(&self, asset_url: &str, referer: &str) -> Result<Vec<u8>> {
        let _permit = self.limiter.acquire(&self.token).await?;
        with_retry(&self.retry, || {
            self.transport.get_asset(asset_url, referer, &self.token)
        })
        .await
    }
}
