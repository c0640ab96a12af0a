//! Per-job state machine and progress accounting.
//!
//! `Created → Scraping → {Completed, Failed}`. Both terminal states are
//! final: once reached, no update is accepted. Progress never decreases,
//! stays under the policy's pre-completion cap while pages are scraped, and
//! jumps to 100 exactly once, on `Completed`.

pub mod registry;

use chrono::Utc;

use crate::models::{JobId, JobSnapshot, JobStatus, ProductRecord, SnapshotUpdate};

pub use registry::JobRegistry;

/// How page completions map onto the 0–100 progress range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPolicy {
    pub scale: u8,
    /// Highest value reported before the job completes.
    pub pre_completion_cap: u8,
}

impl ProgressPolicy {
    /// Pages alone can reach 100.
    #[must_use]
    pub fn uncapped() -> Self {
        Self {
            scale: 100,
            pre_completion_cap: 100,
        }
    }

    /// Pages reach at most 90; the final 10 belong to writing the artifact.
    #[must_use]
    pub fn reserve_for_persistence() -> Self {
        Self {
            scale: 90,
            pre_completion_cap: 90,
        }
    }

    /// `clamp(round(done / total * scale), 0, cap)`, rounding half up.
    #[must_use]
    pub fn progress_for(self, pages_completed: u32, total_pages: u32) -> u8 {
        if total_pages == 0 {
            return 0;
        }
        let done = u64::from(pages_completed);
        let total = u64::from(total_pages);
        let scaled = (done * u64::from(self.scale) * 2 + total) / (2 * total);
        let cap = self.pre_completion_cap.min(100);
        u8::try_from(scaled.min(u64::from(cap))).unwrap_or(cap)
    }
}

impl JobSnapshot {
    /// Applies `update` field by field. Absent fields never erase what is
    /// already set. Returns `false` (and changes nothing) once the job is
    /// terminal or when the update asks for an impossible transition.
    pub fn merge(&mut self, update: SnapshotUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if let Some(next) = update.status
            && !transition_allowed(self.status, next)
        {
            return false;
        }

        if let Some(page) = update.current_page {
            self.current_page = page;
        }
        if let Some(scraped) = update.products_scraped {
            self.products_scraped = scraped;
        }
        if let Some(total) = update.total_products {
            self.total_products = total;
        }

        match update.status {
            Some(JobStatus::Completed) => {
                self.status = JobStatus::Completed;
                self.progress = 100;
                if update.artifact_reference.is_some() {
                    self.artifact_reference = update.artifact_reference;
                }
                self.finished_at = Some(Utc::now());
            }
            Some(JobStatus::Failed) => {
                // Progress freezes at its last value.
                self.status = JobStatus::Failed;
                if update.error_detail.is_some() {
                    self.error_detail = update.error_detail;
                }
                self.finished_at = Some(Utc::now());
            }
            other => {
                if let Some(status) = other {
                    self.status = status;
                }
                if let Some(progress) = update.progress {
                    self.progress = self.progress.max(progress.min(100));
                }
            }
        }
        true
    }
}

fn transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::{Completed, Created, Failed, Scraping};
    matches!(
        (from, to),
        (Created, Created | Scraping | Failed) | (Scraping, Scraping | Completed | Failed)
    )
}

/// Owns one run's accumulated records and emits the snapshot updates that
/// describe its progress.
#[derive(Debug)]
pub struct JobTracker {
    job_id: JobId,
    total_pages: u32,
    policy: ProgressPolicy,
    status: JobStatus,
    pages_completed: u32,
    progress: u8,
    records: Vec<ProductRecord>,
}

impl JobTracker {
    #[must_use]
    pub fn new(job_id: JobId, total_pages: u32, policy: ProgressPolicy) -> Self {
        Self {
            job_id,
            total_pages,
            policy,
            status: JobStatus::Created,
            pages_completed: 0,
            progress: 0,
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub fn pages_completed(&self) -> u32 {
        self.pages_completed
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    /// `Created → Scraping`.
    pub fn start(&mut self) -> Option<SnapshotUpdate> {
        if self.status != JobStatus::Created {
            return None;
        }
        self.status = JobStatus::Scraping;
        Some(SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(0),
            current_page: Some(0),
            products_scraped: Some(0),
            total_products: Some(0),
            ..SnapshotUpdate::default()
        })
    }

    /// Appends one page's records and recomputes progress.
    pub fn page_completed(&mut self, records: Vec<ProductRecord>) -> Option<SnapshotUpdate> {
        if self.status != JobStatus::Scraping {
            return None;
        }
        self.records.extend(records);
        self.pages_completed += 1;
        self.progress = self
            .progress
            .max(self.policy.progress_for(self.pages_completed, self.total_pages));

        let scraped = self.records.len();
        Some(SnapshotUpdate {
            progress: Some(self.progress),
            current_page: Some(self.pages_completed),
            products_scraped: Some(scraped),
            total_products: Some(scraped),
            ..SnapshotUpdate::default()
        })
    }

    /// `Scraping → Completed`; progress becomes exactly 100.
    pub fn complete(&mut self, artifact_reference: String) -> Option<SnapshotUpdate> {
        if self.status != JobStatus::Scraping {
            return None;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        Some(SnapshotUpdate {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            artifact_reference: Some(artifact_reference),
            ..SnapshotUpdate::default()
        })
    }

    /// `Created | Scraping → Failed`; progress keeps its last value.
    pub fn fail(&mut self, error_detail: impl Into<String>) -> Option<SnapshotUpdate> {
        if self.status.is_terminal() {
            return None;
        }
        self.status = JobStatus::Failed;
        Some(SnapshotUpdate {
            status: Some(JobStatus::Failed),
            error_detail: Some(error_detail.into()),
            ..SnapshotUpdate::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, UNKNOWN};

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            identifier: id.to_string(),
            name: format!("Product {id}"),
            price: UNKNOWN.to_string(),
            url: format!("https://shop.example/dp/{id}"),
            rating: UNKNOWN.to_string(),
            rating_count: UNKNOWN.to_string(),
            units_sold: UNKNOWN.to_string(),
            sponsored: false,
            delivery_estimate: UNKNOWN.to_string(),
        }
    }

    #[test]
    fn uncapped_policy_tracks_pages() {
        let policy = ProgressPolicy::uncapped();
        assert_eq!(policy.progress_for(0, 4), 0);
        assert_eq!(policy.progress_for(1, 4), 25);
        assert_eq!(policy.progress_for(2, 4), 50);
        assert_eq!(policy.progress_for(4, 4), 100);
        assert_eq!(policy.progress_for(1, 3), 33);
        assert_eq!(policy.progress_for(2, 3), 67);
        assert_eq!(policy.progress_for(9, 4), 100);
    }

    #[test]
    fn reserved_policy_never_reaches_100_from_pages() {
        let policy = ProgressPolicy::reserve_for_persistence();
        assert_eq!(policy.progress_for(1, 2), 45);
        assert_eq!(policy.progress_for(2, 2), 90);
        assert_eq!(policy.progress_for(5, 2), 90);
        assert_eq!(policy.progress_for(1, 0), 0);
    }

    #[test]
    fn tracker_progress_then_completion() {
        let mut tracker = JobTracker::new(JobId::new(), 4, ProgressPolicy::uncapped());
        assert_eq!(tracker.start().unwrap().progress, Some(0));

        let first = tracker.page_completed(vec![record("A"), record("B")]).unwrap();
        assert_eq!(first.progress, Some(25));
        assert_eq!(first.products_scraped, Some(2));

        let second = tracker.page_completed(vec![record("C")]).unwrap();
        assert_eq!(second.progress, Some(50));
        assert_eq!(second.current_page, Some(2));

        let done = tracker.complete("output/x.csv".into()).unwrap();
        assert_eq!(done.progress, Some(100));
        assert_eq!(tracker.progress(), 100);
        assert_eq!(tracker.records().len(), 3);

        assert!(tracker.complete("again.csv".into()).is_none());
        assert!(tracker.page_completed(vec![record("D")]).is_none());
        assert!(tracker.fail("late").is_none());
        assert_eq!(tracker.records().len(), 3);
    }

    #[test]
    fn failure_before_any_page_keeps_zero_pages() {
        let mut tracker = JobTracker::new(JobId::new(), 3, ProgressPolicy::uncapped());
        tracker.start();
        let failed = tracker.fail("navigation timeout").unwrap();
        assert_eq!(failed.status, Some(JobStatus::Failed));
        assert_eq!(tracker.pages_completed(), 0);
        assert_eq!(tracker.progress(), 0);
    }

    #[test]
    fn merge_never_erases_by_omission() {
        let mut snapshot = JobSnapshot::created(JobId::new(), "alice", Platform::Flipkart, 4);
        assert!(snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(25),
            current_page: Some(1),
            products_scraped: Some(40),
            total_products: Some(40),
            ..SnapshotUpdate::default()
        }));
        assert!(snapshot.merge(SnapshotUpdate {
            current_page: Some(2),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.status, JobStatus::Scraping);
        assert_eq!(snapshot.progress, 25);
        assert_eq!(snapshot.current_page, 2);
        assert_eq!(snapshot.products_scraped, 40);
        assert_eq!(snapshot.total_pages, 4);
    }

    #[test]
    fn merge_keeps_progress_monotonic() {
        let mut snapshot = JobSnapshot::created(JobId::new(), "alice", Platform::Amazon, 4);
        snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(50),
            ..SnapshotUpdate::default()
        });
        snapshot.merge(SnapshotUpdate {
            progress: Some(25),
            ..SnapshotUpdate::default()
        });
        assert_eq!(snapshot.progress, 50);
    }

    #[test]
    fn completed_is_terminal_and_sets_100_once() {
        let mut snapshot = JobSnapshot::created(JobId::new(), "alice", Platform::Amazon, 4);
        snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(45),
            ..SnapshotUpdate::default()
        });
        assert!(snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Completed),
            artifact_reference: Some("output/a.csv".into()),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.artifact_reference.as_deref(), Some("output/a.csv"));
        assert!(snapshot.finished_at.is_some());

        assert!(!snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Failed),
            error_detail: Some("late".into()),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert!(snapshot.error_detail.is_none());
    }

    #[test]
    fn failed_freezes_progress_and_rejects_later_updates() {
        let mut snapshot = JobSnapshot::created(JobId::new(), "alice", Platform::Amazon, 4);
        snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(25),
            ..SnapshotUpdate::default()
        });
        assert!(snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Failed),
            progress: Some(80),
            error_detail: Some("boom".into()),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.progress, 25);
        assert_eq!(snapshot.error_detail.as_deref(), Some("boom"));
        assert!(!snapshot.merge(SnapshotUpdate {
            progress: Some(90),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.progress, 25);
    }

    #[test]
    fn completion_cannot_skip_scraping() {
        let mut snapshot = JobSnapshot::created(JobId::new(), "alice", Platform::Amazon, 1);
        assert!(!snapshot.merge(SnapshotUpdate {
            status: Some(JobStatus::Completed),
            ..SnapshotUpdate::default()
        }));
        assert_eq!(snapshot.status, JobStatus::Created);
    }
}
