//! Configuration types for manga-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for [`MangaDownloader`](crate::MangaDownloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for downloaded chapters (default: "./downloads")
    ///
    /// Page files land in `<download_dir>/<source>/<series>/<chapter>/`,
    /// with filesystem-invalid characters stripped from each component.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Default maximum concurrent connections per source (default: 4)
    ///
    /// A crawler may override this for its own source via
    /// [`SourceCrawler::max_connections`](crate::crawler::SourceCrawler::max_connections).
    #[serde(default = "default_max_connections")]
    pub max_connections_per_source: usize,

    /// Maximum number of tasks simultaneously in the page phase (default: 3)
    ///
    /// This is a source-independent gate, distinct from the per-source
    /// connection limiter.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// User-agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry behavior for transport failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_connections_per_source: default_max_connections(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transport failures
///
/// There is deliberately no delay or backoff field: failed attempts are
/// retried immediately.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_connections() -> usize {
    4
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_user_agent() -> String {
    format!("manga-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}
