//! Static-page browser session over plain HTTP.
//!
//! No script runs, so the page never grows: waits resolve against the
//! fetched document, scrolling is a no-op and "clicking" a link follows its
//! `href`. Enough to drive parameter-paginated sites end to end.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::error::HarvestError;
use crate::traits::{BrowserLauncher, BrowserSession, LoadState};

/// Launches [`HttpSession`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    /// # Errors
    ///
    /// Returns [`HarvestError::Http`] when the client cannot be built.
    pub fn new(user_agent: &str) -> Result<Self, HarvestError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserLauncher for HttpBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError> {
        Ok(Box::new(HttpSession::new(self.client.clone())))
    }
}

struct LoadedPage {
    url: Url,
    html: String,
}

pub struct HttpSession {
    client: Client,
    page: RwLock<Option<LoadedPage>>,
}

impl HttpSession {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page: RwLock::new(None),
        }
    }

    async fn fetch(&self, url: &str) -> Result<LoadedPage, HarvestError> {
        let parsed = Url::parse(url).map_err(|source| HarvestError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self.client.get(parsed.clone()).send().await?;
        if !response.status().is_success() {
            return Err(HarvestError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        // Redirects land on the final URL.
        let final_url = response.url().clone();
        let html = response.text().await?;
        Ok(LoadedPage {
            url: final_url,
            html,
        })
    }

    async fn matches(&self, locator: &str) -> Result<bool, HarvestError> {
        let selector = parse_selector(locator)?;
        let page = self.page.read().await;
        Ok(page
            .as_ref()
            .is_some_and(|page| Html::parse_document(&page.html).select(&selector).next().is_some()))
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(
        &self,
        url: &str,
        wait: LoadState,
        timeout: Duration,
    ) -> Result<(), HarvestError> {
        debug!("Fetching {} (waiting for {:?})", url, wait);
        let page = tokio::time::timeout(timeout, self.fetch(url))
            .await
            .map_err(|_| HarvestError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            })??;
        *self.page.write().await = Some(page);
        Ok(())
    }

    /// The document is fixed once fetched, so there is nothing to wait for.
    async fn wait_for_locator(&self, locator: &str, _timeout: Duration) -> bool {
        self.matches(locator).await.unwrap_or(false)
    }

    async fn page_source(&self) -> Result<String, HarvestError> {
        self.page
            .read()
            .await
            .as_ref()
            .map(|page| page.html.clone())
            .ok_or_else(|| HarvestError::Session("no page loaded".to_string()))
    }

    async fn click(&self, locator: &str) -> Result<(), HarvestError> {
        let selector = parse_selector(locator)?;
        let target = {
            let page = self.page.read().await;
            let page = page
                .as_ref()
                .ok_or_else(|| HarvestError::Session("no page loaded".to_string()))?;
            let document = Html::parse_document(&page.html);
            let href = document
                .select(&selector)
                .next()
                .ok_or_else(|| HarvestError::ElementNotFound {
                    locator: locator.to_string(),
                })?
                .value()
                .attr("href")
                .ok_or_else(|| HarvestError::Session(format!("{locator} has no href to follow")))?
                .to_string();
            page.url
                .join(&href)
                .map_err(|source| HarvestError::InvalidUrl { url: href, source })?
        };

        info!("Following {}", target);
        let page = self.fetch(target.as_str()).await?;
        *self.page.write().await = Some(page);
        Ok(())
    }

    /// Every request has finished by the time `navigate` returns.
    async fn wait_for_network_idle(&self, _timeout: Duration) -> bool {
        true
    }

    async fn scroll_by(&self, _distance: u32) -> Result<(), HarvestError> {
        Ok(())
    }

    async fn scroll_height(&self) -> Result<u64, HarvestError> {
        Ok(0)
    }

    async fn current_url(&self) -> Option<String> {
        self.page
            .read()
            .await
            .as_ref()
            .map(|page| page.url.to_string())
    }

    async fn close(&self) -> Result<(), HarvestError> {
        self.page.write().await.take();
        Ok(())
    }
}

fn parse_selector(locator: &str) -> Result<Selector, HarvestError> {
    Selector::parse(locator).map_err(|e| HarvestError::InvalidSelector {
        selector: locator.to_string(),
        reason: format!("{e:?}"),
    })
}
