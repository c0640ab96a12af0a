//! Wait barrier run before every extraction.
//!
//! Layout variants announce their results with different markup, so several
//! independently-timed conditions race and the first to match wins. A gate
//! where every condition times out is not an error: extraction simply runs
//! against whatever the DOM holds. Lazy content is then forced to render by
//! scrolling in fixed steps until the page stops growing.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::error::HarvestError;
use crate::extract::Locator;
use crate::traits::BrowserSession;

/// One "results are present" signal with its own time bound.
#[derive(Debug, Clone)]
pub struct WaitCondition {
    pub locator: Locator,
    pub timeout: Duration,
}

impl WaitCondition {
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidSelector`] when `css` does not parse.
    pub fn new(css: &str, timeout: Duration) -> Result<Self, HarvestError> {
        Ok(Self {
            locator: Locator::parse(css)?,
            timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessProfile {
    pub conditions: Vec<WaitCondition>,
    /// Fixed delay after auto-scroll for late renders.
    pub settle: Duration,
}

/// What the gate observed on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOutcome {
    /// Locator of the condition that resolved first, if any did.
    pub matched: Option<String>,
    pub scroll_steps: usize,
}

/// Races `conditions` and returns the index of the first one to match.
///
/// Conditions that time out drop out of the race; `None` means all of them did.
pub async fn wait_for_any(
    session: &dyn BrowserSession,
    conditions: &[WaitCondition],
) -> Option<usize> {
    let mut race: FuturesUnordered<_> = conditions
        .iter()
        .enumerate()
        .map(|(index, condition)| async move {
            let found = tokio::time::timeout(
                condition.timeout,
                session.wait_for_locator(condition.locator.as_str(), condition.timeout),
            )
            .await
            .unwrap_or(false);
            (index, found)
        })
        .collect();

    while let Some((index, found)) = race.next().await {
        if found {
            return Some(index);
        }
        debug!(
            "Readiness condition {} timed out",
            conditions[index].locator.as_str()
        );
    }
    None
}

/// Scrolls in fixed steps until the bottom is reached and the scroll height
/// stops growing, or the step budget runs out. Returns the steps taken.
pub async fn auto_scroll(session: &dyn BrowserSession, timings: &Timings) -> usize {
    let mut height = match session.scroll_height().await {
        Ok(height) => height,
        Err(e) => {
            warn!("Could not read scroll height, skipping auto-scroll: {}", e);
            return 0;
        }
    };
    let mut scrolled: u64 = 0;
    let mut steps = 0;

    while steps < timings.max_scroll_steps && scrolled < height {
        if let Err(e) = session.scroll_by(timings.scroll_step).await {
            warn!("Auto-scroll stopped after {} steps: {}", steps, e);
            break;
        }
        scrolled += u64::from(timings.scroll_step);
        steps += 1;
        tokio::time::sleep(timings.scroll_interval).await;

        match session.scroll_height().await {
            Ok(current) => height = current,
            Err(e) => {
                warn!("Auto-scroll stopped after {} steps: {}", steps, e);
                break;
            }
        }
    }

    steps
}

/// Full gate: race the readiness conditions, auto-scroll, then settle.
pub async fn await_results(
    session: &dyn BrowserSession,
    profile: &ReadinessProfile,
    timings: &Timings,
) -> GateOutcome {
    let matched = wait_for_any(session, &profile.conditions)
        .await
        .map(|index| profile.conditions[index].locator.as_str().to_string());

    match &matched {
        Some(locator) => debug!("Results present via {}", locator),
        None => info!("No readiness condition matched in time, proceeding with current DOM"),
    }

    let scroll_steps = auto_scroll(session, timings).await;
    tokio::time::sleep(profile.settle).await;

    GateOutcome {
        matched,
        scroll_steps,
    }
}
