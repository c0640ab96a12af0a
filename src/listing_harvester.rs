//! Job submission and the per-job run loop.

use std::sync::Arc;

use scraper::Html;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Timings;
use crate::error::{HarvestError, LookupError};
use crate::extract::extract_page;
use crate::models::{JobId, JobSnapshot, Platform, ProgressEvent, SnapshotUpdate};
use crate::pagination::{Advance, advance, open_first_page};
use crate::readiness::await_results;
use crate::scrapers::SiteProfile;
use crate::traits::{ArtifactSink, BrowserLauncher, BrowserSession};
use crate::tracker::{JobRegistry, JobTracker};

/// Starts scraping jobs and answers snapshot queries about them.
///
/// Each job runs on its own task with its own browser session; jobs share
/// nothing but the registry.
#[derive(Clone)]
pub struct ListingHarvester {
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<dyn ArtifactSink>,
    timings: Timings,
    registry: JobRegistry,
}

impl ListingHarvester {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn ArtifactSink>,
        timings: Timings,
    ) -> Self {
        Self {
            launcher,
            sink,
            timings,
            registry: JobRegistry::new(),
        }
    }

    /// Submits a job using the built-in profile for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidPageCount`] for `max_pages == 0`, or a
    /// selector error if the built-in profile fails to load.
    pub fn start_job(
        &self,
        url: &str,
        platform: Platform,
        max_pages: u32,
        owner: &str,
    ) -> Result<JobId, HarvestError> {
        let profile = SiteProfile::for_platform(platform)?;
        self.start_job_with_profile(url, profile, max_pages, owner)
    }

    /// Submits a job driven by an explicit site profile. The job runs in the
    /// background; the returned id is immediately queryable.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidPageCount`] for `max_pages == 0`.
    pub fn start_job_with_profile(
        &self,
        url: &str,
        profile: SiteProfile,
        max_pages: u32,
        owner: &str,
    ) -> Result<JobId, HarvestError> {
        if max_pages == 0 {
            return Err(HarvestError::InvalidPageCount);
        }

        let job_id = JobId::new();
        self.registry
            .put(JobSnapshot::created(job_id, owner, profile.platform, max_pages));
        info!(
            "Job {} created for {} ({} pages) by {}",
            job_id, profile.name, max_pages, owner
        );

        let harvester = self.clone();
        let start_url = url.to_string();
        tokio::spawn(async move {
            harvester.run_job(job_id, profile, start_url, max_pages).await;
        });

        Ok(job_id)
    }

    /// Every accepted snapshot change, for all jobs.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.registry.subscribe()
    }

    /// Latest snapshot of a job started by `owner`.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] or [`LookupError::AccessDenied`].
    pub fn snapshot(&self, job_id: JobId, owner: &str) -> Result<JobSnapshot, LookupError> {
        self.registry.get(job_id, owner)
    }

    /// All jobs started by `owner`, oldest first.
    #[must_use]
    pub fn jobs(&self, owner: &str) -> Vec<JobSnapshot> {
        self.registry.list(owner)
    }

    async fn run_job(self, job_id: JobId, profile: SiteProfile, start_url: String, total_pages: u32) {
        let mut tracker = JobTracker::new(job_id, total_pages, profile.progress);
        self.publish(job_id, tracker.start());

        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!("Job {} could not open a browser session: {}", job_id, e);
                self.publish(job_id, tracker.fail(e.to_string()));
                return;
            }
        };

        let outcome = self
            .scrape_pages(session.as_ref(), &profile, &start_url, &mut tracker)
            .await;

        if let Err(e) = session.close().await {
            warn!("Job {} failed to close its session: {}", job_id, e);
        }

        if let Err(e) = outcome {
            error!("Job {} failed: {}", job_id, e);
            self.publish(job_id, tracker.fail(e.to_string()));
            return;
        }

        info!(
            "Job {} scraped {} products over {} pages",
            job_id,
            tracker.records().len(),
            tracker.pages_completed()
        );

        match self
            .sink
            .persist(profile.platform, &profile.columns, tracker.records())
            .await
        {
            Ok(artifact) => self.publish(job_id, tracker.complete(artifact)),
            Err(e) => {
                error!("Job {} could not persist its results: {}", job_id, e);
                self.publish(job_id, tracker.fail(e.to_string()));
            }
        }
    }

    /// Pages are strictly sequential: each one starts from the DOM the
    /// previous one left behind.
    async fn scrape_pages(
        &self,
        session: &dyn BrowserSession,
        profile: &SiteProfile,
        start_url: &str,
        tracker: &mut JobTracker,
    ) -> Result<(), HarvestError> {
        let job_id = tracker.job_id();
        let extraction_profile = &profile.extraction;
        let extractor = move |document: &Html| extract_page(document, extraction_profile);

        for page in 1..=tracker.total_pages() {
            if page == 1 {
                open_first_page(session, start_url, &self.timings).await?;
            } else {
                tokio::time::sleep(self.timings.page_delay).await;
                let advanced =
                    advance(session, &profile.pagination, start_url, page, &self.timings).await;
                if advanced == Advance::Exhausted {
                    break;
                }
            }

            info!("Job {}: scraping page {}", job_id, page);
            let gate = await_results(session, &profile.readiness, &self.timings).await;

            let extraction = match session.evaluate_in_page(&extractor).await {
                Ok(extraction) => extraction,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!("Extraction failed on page {}, stopping pagination: {}", page, e);
                    break;
                }
            };

            let stats = &extraction.stats;
            info!(
                "Page {}: ready via {}, {} scroll steps, {} nodes, {} without id, {} duplicates, {} without URL, {} added",
                page,
                gate.matched.as_deref().unwrap_or("timeout"),
                gate.scroll_steps,
                stats.nodes,
                stats.skipped_no_identifier,
                stats.skipped_duplicate,
                stats.skipped_no_url,
                stats.added
            );

            let empty = extraction.records.is_empty();
            self.publish(job_id, tracker.page_completed(extraction.records));

            if empty && page > 1 {
                info!("No products found on page {}, stopping pagination", page);
                break;
            }
        }

        Ok(())
    }

    fn publish(&self, job_id: JobId, update: Option<SnapshotUpdate>) {
        if let Some(update) = update {
            self.registry.merge(job_id, update);
        }
    }
}
