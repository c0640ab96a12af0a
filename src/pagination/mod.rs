//! Moving a session from one results page to the next.
//!
//! Two strategies, picked per site: rewrite a page-number query parameter
//! and navigate directly, or click the site's "next" control. Running out of
//! pages is a normal outcome ([`Advance::Exhausted`]), never an error; only
//! the first page load can fail a job.

use tracing::{debug, info, warn};
use url::Url;

use crate::config::Timings;
use crate::error::HarvestError;
use crate::extract::Locator;
use crate::traits::{BrowserSession, LoadState, NodeSnapshot};

#[derive(Debug, Clone)]
pub enum PaginationStrategy {
    /// Rewrite (or append) `key=<page>` in the start URL.
    UrlParameter { key: String },
    /// Click the first usable match from `next_locators`. A match carrying
    /// `disabled_class` or `aria-disabled="true"` is not usable.
    NextControl {
        next_locators: Vec<Locator>,
        disabled_class: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Loaded,
    Exhausted,
}

/// Loads the first results page. Failure here is fatal to the job.
///
/// # Errors
///
/// Propagates the session's navigation error.
pub async fn open_first_page(
    session: &dyn BrowserSession,
    url: &str,
    timings: &Timings,
) -> Result<(), HarvestError> {
    info!("Navigating to: {}", url);
    session
        .navigate(url, LoadState::NetworkIdle, timings.navigation_timeout)
        .await
}

/// Advances to `page` (1-based, always > 1).
pub async fn advance(
    session: &dyn BrowserSession,
    strategy: &PaginationStrategy,
    start_url: &str,
    page: u32,
    timings: &Timings,
) -> Advance {
    match strategy {
        PaginationStrategy::UrlParameter { key } => {
            advance_by_parameter(session, start_url, key, page, timings).await
        }
        PaginationStrategy::NextControl {
            next_locators,
            disabled_class,
        } => advance_by_next_control(session, next_locators, disabled_class, timings).await,
    }
}

async fn advance_by_parameter(
    session: &dyn BrowserSession,
    start_url: &str,
    key: &str,
    page: u32,
    timings: &Timings,
) -> Advance {
    let url = match with_page_param(start_url, key, page) {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot build URL for page {}: {}", page, e);
            return Advance::Exhausted;
        }
    };

    info!("Navigating to: {}", url);
    match session
        .navigate(&url, LoadState::NetworkIdle, timings.navigation_timeout)
        .await
    {
        Ok(()) => Advance::Loaded,
        Err(e) => {
            warn!("Error navigating to page {}, stopping pagination: {}", page, e);
            Advance::Exhausted
        }
    }
}

async fn advance_by_next_control(
    session: &dyn BrowserSession,
    next_locators: &[Locator],
    disabled_class: &str,
    timings: &Timings,
) -> Advance {
    // Pagination controls may only render once the bottom is in view.
    match session.scroll_height().await {
        Ok(height) => {
            let distance = u32::try_from(height).unwrap_or(u32::MAX);
            if let Err(e) = session.scroll_by(distance).await {
                debug!("Scroll to bottom failed: {}", e);
            }
        }
        Err(e) => debug!("Scroll height unavailable: {}", e),
    }
    tokio::time::sleep(timings.bottom_scroll_delay).await;

    let Some(next) = find_usable_next(session, next_locators, disabled_class).await else {
        info!("No next page control found or next page is disabled. Stopping pagination.");
        return Advance::Exhausted;
    };

    info!("Clicking next page control {}", next.as_str());
    tokio::time::sleep(timings.pre_click_delay).await;
    if let Err(e) = session.click(next.as_str()).await {
        warn!("Error clicking next page control, stopping pagination: {}", e);
        return Advance::Exhausted;
    }
    tokio::time::sleep(timings.post_click_delay).await;

    // Client-side pagination may never fire a navigation event.
    if !session
        .wait_for_network_idle(timings.network_settle_timeout)
        .await
    {
        debug!("Network did not settle after click, using fixed settle delay");
        tokio::time::sleep(timings.fallback_settle).await;
    }

    if let Some(url) = session.current_url().await {
        info!("Navigated to: {}", url);
    }
    Advance::Loaded
}

async fn find_usable_next<'a>(
    session: &dyn BrowserSession,
    next_locators: &'a [Locator],
    disabled_class: &str,
) -> Option<&'a Locator> {
    for locator in next_locators {
        let first = match session.query_all(locator.as_str()).await {
            Ok(nodes) => nodes.into_iter().next(),
            Err(e) => {
                debug!("Probe {} failed: {}", locator.as_str(), e);
                None
            }
        };
        match first {
            Some(node) if !is_disabled(&node, disabled_class) => return Some(locator),
            Some(_) => debug!("Next control {} is disabled", locator.as_str()),
            None => {}
        }
    }
    None
}

/// True when a pagination control is marked as disabled.
#[must_use]
pub fn is_disabled(node: &NodeSnapshot, disabled_class: &str) -> bool {
    node.has_class(disabled_class)
        || node
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Sets `key=page` in `url`'s query, replacing an existing value or appending.
///
/// # Errors
///
/// Returns [`HarvestError::InvalidUrl`] when `url` does not parse.
pub fn with_page_param(url: &str, key: &str, page: u32) -> Result<String, HarvestError> {
    let mut parsed = Url::parse(url).map_err(|source| HarvestError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    let page = page.to_string();
    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            if k == key {
                replaced = true;
                (k.into_owned(), page.clone())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if !replaced {
        pairs.push((key.to_string(), page));
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(parsed.to_string())
}
