//! Traits and interfaces for the collaborators a harvest job drives

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::HarvestError;
use crate::extract::PageExtraction;
use crate::models::{Platform, ProductRecord};
use crate::scrapers::ArtifactColumn;

/// Signal a navigation waits for before it is considered done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No more than two open connections for a short quiet period.
    NetworkIdle,
}

/// Attributes and classes of one element, detached from the live page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub classes: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub text: String,
}

impl NodeSnapshot {
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Pure extraction callback run against a DOM snapshot of the current page.
pub type PageExtractor<'a> = dyn Fn(&Html) -> PageExtraction + Send + Sync + 'a;

/// One browser tab owned by exactly one job.
///
/// Every wait takes its own bound. Implementations suspend rather than poll.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Loads `url` and waits for `wait` up to `timeout`.
    async fn navigate(&self, url: &str, wait: LoadState, timeout: Duration)
    -> Result<(), HarvestError>;

    /// Resolves `true` once `locator` matches, `false` when `timeout` elapses first.
    async fn wait_for_locator(&self, locator: &str, timeout: Duration) -> bool;

    /// Serialized DOM of the current page.
    async fn page_source(&self) -> Result<String, HarvestError>;

    /// Clicks the first element matching `locator`.
    async fn click(&self, locator: &str) -> Result<(), HarvestError>;

    /// Resolves `true` when network activity settles within `timeout`.
    async fn wait_for_network_idle(&self, timeout: Duration) -> bool;

    async fn scroll_by(&self, distance: u32) -> Result<(), HarvestError>;

    /// Current document scroll height in pixels.
    async fn scroll_height(&self) -> Result<u64, HarvestError>;

    /// URL of the page currently loaded.
    async fn current_url(&self) -> Option<String>;

    /// Releases the session. Called exactly once on every exit path.
    async fn close(&self) -> Result<(), HarvestError>;

    /// Runs `extractor` against a snapshot of the current DOM.
    async fn evaluate_in_page(
        &self,
        extractor: &PageExtractor<'_>,
    ) -> Result<PageExtraction, HarvestError> {
        let source = self.page_source().await?;
        Ok(extractor(&Html::parse_document(&source)))
    }

    /// Snapshots every element matching `locator`.
    async fn query_all(&self, locator: &str) -> Result<Vec<NodeSnapshot>, HarvestError> {
        let source = self.page_source().await?;
        let selector = Selector::parse(locator).map_err(|e| HarvestError::InvalidSelector {
            selector: locator.to_string(),
            reason: format!("{e:?}"),
        })?;
        let document = Html::parse_document(&source);
        Ok(document
            .select(&selector)
            .map(|element| NodeSnapshot {
                classes: element.value().classes().map(str::to_string).collect(),
                attributes: element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                text: element.text().collect::<String>().trim().to_string(),
            })
            .collect())
    }
}

/// Opens one independent session per job.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError>;
}

/// Persists a finished job's records and returns a reference to the artifact.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn persist(
        &self,
        platform: Platform,
        columns: &[ArtifactColumn],
        records: &[ProductRecord],
    ) -> Result<String, HarvestError>;
}
