//! Scripted collaborators for driving the run loop without a browser.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_harvester::error::HarvestError;
use listing_harvester::models::{JobId, JobSnapshot, Platform, ProductRecord};
use listing_harvester::scrapers::ArtifactColumn;
use listing_harvester::traits::{ArtifactSink, BrowserLauncher, BrowserSession, LoadState};
use listing_harvester::ListingHarvester;
use url::Url;

/// Pages served in order. Parameter navigation picks the page from the
/// `page` query key; clicking "next" moves to the following page.
#[derive(Clone, Default)]
pub struct Script {
    pub pages: Vec<String>,
    /// Navigating to this zero-based page index (or any later one) fails.
    pub fail_navigation_from: Option<usize>,
    /// The network-settle signal never fires after a click.
    pub network_never_settles: bool,
}

#[derive(Default)]
pub struct SessionLog {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub clicks: Mutex<Vec<String>>,
    pub unsettled_waits: AtomicUsize,
}

impl SessionLog {
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }
}

pub struct ScriptedLauncher {
    script: Script,
    pub log: Arc<SessionLog>,
}

impl ScriptedLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::new(SessionLog::default()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            current: Mutex::new(None),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedSession {
    script: Script,
    current: Mutex<Option<usize>>,
    log: Arc<SessionLog>,
}

impl ScriptedSession {
    fn load(&self, index: usize, url: &str) -> Result<(), HarvestError> {
        let failing = self
            .script
            .fail_navigation_from
            .is_some_and(|from| index >= from);
        if failing || index >= self.script.pages.len() {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        *self.current.lock().unwrap() = Some(index);
        Ok(())
    }
}

fn page_index(url: &str) -> usize {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse::<usize>().ok())
        })
        .map_or(0, |page| page.saturating_sub(1))
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&self, url: &str, _: LoadState, _: Duration) -> Result<(), HarvestError> {
        self.log.navigations.lock().unwrap().push(url.to_string());
        self.load(page_index(url), url)
    }

    async fn wait_for_locator(&self, _: &str, _: Duration) -> bool {
        true
    }

    async fn page_source(&self) -> Result<String, HarvestError> {
        let current = *self.current.lock().unwrap();
        current
            .map(|index| self.script.pages[index].clone())
            .ok_or_else(|| HarvestError::Session("no page loaded".to_string()))
    }

    async fn click(&self, locator: &str) -> Result<(), HarvestError> {
        self.log.clicks.lock().unwrap().push(locator.to_string());
        let next = self.current.lock().unwrap().map_or(0, |index| index + 1);
        self.load(next, locator)
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> bool {
        if self.script.network_never_settles {
            self.log.unsettled_waits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(timeout).await;
            return false;
        }
        true
    }

    async fn scroll_by(&self, _: u32) -> Result<(), HarvestError> {
        Ok(())
    }

    async fn scroll_height(&self) -> Result<u64, HarvestError> {
        Ok(0)
    }

    async fn current_url(&self) -> Option<String> {
        None
    }

    async fn close(&self) -> Result<(), HarvestError> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps persisted record sets in memory.
#[derive(Default)]
pub struct MemorySink {
    pub persisted: Mutex<Vec<(Platform, Vec<ProductRecord>)>>,
    pub fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn persisted(&self) -> Vec<(Platform, Vec<ProductRecord>)> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn persist(
        &self,
        platform: Platform,
        _columns: &[ArtifactColumn],
        records: &[ProductRecord],
    ) -> Result<String, HarvestError> {
        if self.fail {
            return Err(HarvestError::Artifact("disk full".to_string()));
        }
        let mut persisted = self.persisted.lock().unwrap();
        persisted.push((platform, records.to_vec()));
        Ok(format!("memory://{platform}/{}", persisted.len()))
    }
}

/// Collects every snapshot published for `job_id` until it is terminal.
pub async fn run_to_end(
    harvester: &ListingHarvester,
    start: impl FnOnce(&ListingHarvester) -> JobId,
) -> (JobId, Vec<JobSnapshot>) {
    let mut events = harvester.subscribe();
    let job_id = start(harvester);

    let collect = async {
        let mut seen = Vec::new();
        while let Ok(event) = events.recv().await {
            if event.job_id != job_id {
                continue;
            }
            let terminal = event.snapshot.status.is_terminal();
            seen.push(event.snapshot);
            if terminal {
                break;
            }
        }
        seen
    };

    let seen = tokio::time::timeout(Duration::from_secs(10), collect)
        .await
        .expect("job did not finish in time");
    (job_id, seen)
}

pub enum Next {
    Enabled,
    AriaDisabled,
    Missing,
}

/// One Amazon results page with a card per id.
pub fn amazon_page(ids: &[&str], next: Next) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div data-component-type="s-search-result" data-asin="{id}">
  <h2><a class="a-text-normal" href="/item/dp/{id}/ref=sr_1?qid=1"><span>Item {id}</span></a></h2>
  <span class="a-price"><span class="a-offscreen">₹1,099.00</span></span>
</div>"#
            )
        })
        .collect();
    let next = match next {
        Next::Enabled => r#"<a class="s-pagination-item s-pagination-next" href="/s?k=rack&page=2">Next</a>"#,
        Next::AriaDisabled => r#"<a class="s-pagination-item s-pagination-next" aria-disabled="true">Next</a>"#,
        Next::Missing => "",
    };
    format!("<html><body><div class=\"s-main-slot\">{cards}</div>{next}</body></html>")
}

/// One Flipkart results page with a card per id.
pub fn flipkart_page(ids: &[&str]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div data-id="{id}">
  <a class="pIpigb" title="Item {id}" href="/item-{id}/p/itm{id}?pid={id}&lid=L">Item {id}</a>
  <div class="hZ3P6w">₹999</div>
</div>"#
            )
        })
        .collect();
    format!("<html><body>{cards}</body></html>")
}
