//! Shared store of job snapshots, safe for concurrent readers and writers.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::LookupError;
use crate::models::{JobId, JobSnapshot, ProgressEvent, SnapshotUpdate};

const EVENT_CAPACITY: usize = 256;

/// Concurrent map of job id to latest snapshot, publishing every accepted
/// change as a [`ProgressEvent`].
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, JobSnapshot>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Registers a fresh snapshot and announces it.
    pub fn put(&self, snapshot: JobSnapshot) {
        self.jobs.insert(snapshot.job_id, snapshot.clone());
        self.publish(snapshot);
    }

    /// Merges `update` into the job's snapshot. Returns the merged snapshot
    /// when the update was accepted; unknown ids and rejected updates give `None`.
    pub fn merge(&self, job_id: JobId, update: SnapshotUpdate) -> Option<JobSnapshot> {
        let merged = {
            let mut entry = self.jobs.get_mut(&job_id)?;
            if !entry.merge(update) {
                debug!("Update for job {} rejected in state {:?}", job_id, entry.status);
                return None;
            }
            entry.clone()
        };
        self.publish(merged.clone());
        Some(merged)
    }

    /// Latest snapshot for `job_id`, only if `owner` started it.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] for an unknown id, [`LookupError::AccessDenied`]
    /// when the job belongs to someone else.
    pub fn get(&self, job_id: JobId, owner: &str) -> Result<JobSnapshot, LookupError> {
        let entry = self.jobs.get(&job_id).ok_or(LookupError::NotFound(job_id))?;
        if entry.owner != owner {
            return Err(LookupError::AccessDenied(job_id));
        }
        Ok(entry.clone())
    }

    /// Snapshots owned by `owner`, oldest first.
    #[must_use]
    pub fn list(&self, owner: &str) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .jobs
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|snapshot| snapshot.job_id);
        jobs
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    fn publish(&self, snapshot: JobSnapshot) {
        // No subscribers is fine.
        let _ = self.events.send(ProgressEvent {
            job_id: snapshot.job_id,
            snapshot,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, Platform};

    fn scraping(progress: u8) -> SnapshotUpdate {
        SnapshotUpdate {
            status: Some(JobStatus::Scraping),
            progress: Some(progress),
            ..SnapshotUpdate::default()
        }
    }

    #[test]
    fn lookup_checks_owner() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        registry.put(JobSnapshot::created(id, "alice", Platform::Amazon, 2));

        assert_eq!(registry.get(id, "alice").unwrap().job_id, id);
        assert_eq!(registry.get(id, "bob"), Err(LookupError::AccessDenied(id)));

        let unknown = JobId::new();
        assert_eq!(
            registry.get(unknown, "alice"),
            Err(LookupError::NotFound(unknown))
        );
    }

    #[test]
    fn merge_publishes_accepted_updates_only() {
        let registry = JobRegistry::new();
        let mut events = registry.subscribe();
        let id = JobId::new();
        registry.put(JobSnapshot::created(id, "alice", Platform::Flipkart, 2));

        assert!(registry.merge(id, scraping(50)).is_some());
        assert!(registry.merge(id, SnapshotUpdate {
            status: Some(JobStatus::Failed),
            error_detail: Some("boom".into()),
            ..SnapshotUpdate::default()
        })
        .is_some());
        assert!(registry.merge(id, scraping(100)).is_none());
        assert!(registry.merge(JobId::new(), scraping(10)).is_none());

        let statuses: Vec<JobStatus> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.snapshot.status)
            .collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Created, JobStatus::Scraping, JobStatus::Failed]
        );
    }

    #[test]
    fn list_filters_by_owner() {
        let registry = JobRegistry::new();
        let first = JobId::new();
        let second = JobId::new();
        registry.put(JobSnapshot::created(first, "alice", Platform::Amazon, 1));
        registry.put(JobSnapshot::created(JobId::new(), "bob", Platform::Amazon, 1));
        registry.put(JobSnapshot::created(second, "alice", Platform::Flipkart, 1));

        let ids: Vec<JobId> = registry.list("alice").iter().map(|s| s.job_id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn concurrent_jobs_do_not_interfere() {
        let registry = JobRegistry::new();
        let ids: Vec<JobId> = (0..8).map(|_| JobId::new()).collect();
        for id in &ids {
            registry.put(JobSnapshot::created(*id, "alice", Platform::Amazon, 10));
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let registry = registry.clone();
                let id = *id;
                tokio::spawn(async move {
                    for progress in (0..=90).step_by(10) {
                        registry.merge(id, scraping(progress));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for id in ids {
            let snapshot = registry.get(id, "alice").unwrap();
            assert_eq!(snapshot.progress, 90);
            assert_eq!(snapshot.status, JobStatus::Scraping);
        }
    }
}
