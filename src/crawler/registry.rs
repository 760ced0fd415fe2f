//! Explicit crawler registration.

use std::collections::HashMap;
use std::sync::Arc;

use super::SourceCrawler;

/// Maps source names to crawler implementations.
///
/// Populated by explicit [`register`](CrawlerRegistry::register) calls at
/// startup; the orchestrator builds one
/// [`Source`](crate::catalog::Source) per registered crawler.
#[derive(Clone, Default)]
pub struct CrawlerRegistry {
    map: HashMap<String, Arc<dyn SourceCrawler>>,
    order: Vec<String>,
}

impl CrawlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a crawler under its own name.
    ///
    /// Registering a second crawler with the same name replaces the first.
    pub fn register(&mut self, crawler: Arc<dyn SourceCrawler>) {
        let name = crawler.name().to_string();
        if self.map.insert(name.clone(), crawler).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a crawler by source name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceCrawler>> {
        self.map.get(name).cloned()
    }

    /// All registered crawlers, in registration order.
    pub fn crawlers(&self) -> Vec<Arc<dyn SourceCrawler>> {
        self.order
            .iter()
            .filter_map(|name| self.map.get(name).cloned())
            .collect()
    }

    /// Number of registered crawlers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no crawler has been registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
