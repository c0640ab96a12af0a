//! Data models for product records and job snapshots

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HarvestError;

/// Placeholder for any field that could not be extracted.
pub const UNKNOWN: &str = "N/A";

/// A product listing scraped from one search-results page.
///
/// `identifier` and `url` are always present; every other text field holds
/// [`UNKNOWN`] when extraction failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub(crate) identifier: String,
    pub(crate) name: String,
    pub(crate) price: String,
    pub(crate) url: String,
    pub(crate) rating: String,
    pub(crate) rating_count: String,
    pub(crate) units_sold: String,
    pub(crate) sponsored: bool,
    pub(crate) delivery_estimate: String,
}

impl ProductRecord {
    /// Site identifier used for de-duplication within a job.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn price(&self) -> &str {
        &self.price
    }

    /// Absolute product URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn rating(&self) -> &str {
        &self.rating
    }

    #[must_use]
    pub fn rating_count(&self) -> &str {
        &self.rating_count
    }

    #[must_use]
    pub fn units_sold(&self) -> &str {
        &self.units_sold
    }

    #[must_use]
    pub fn sponsored(&self) -> bool {
        self.sponsored
    }

    #[must_use]
    pub fn delivery_estimate(&self) -> &str {
        &self.delivery_estimate
    }

    /// `Yes`/`No` rendering used by the tabular artifact.
    #[must_use]
    pub fn sponsored_label(&self) -> &'static str {
        if self.sponsored { "Yes" } else { "No" }
    }
}

/// Supported e-commerce sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Flipkart,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Flipkart => "flipkart",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Self::Amazon),
            "flipkart" => Ok(Self::Flipkart),
            other => Err(HarvestError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Opaque job identifier. UUIDv7, so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Scraping,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Point-in-time external view of a scraping job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub owner: String,
    pub platform: Platform,
    pub status: JobStatus,
    pub progress: u8,
    pub current_page: u32,
    pub total_pages: u32,
    pub products_scraped: usize,
    pub total_products: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Fresh snapshot for a job that has been submitted but not started.
    #[must_use]
    pub fn created(job_id: JobId, owner: &str, platform: Platform, total_pages: u32) -> Self {
        Self {
            job_id,
            owner: owner.to_string(),
            platform,
            status: JobStatus::Created,
            progress: 0,
            current_page: 0,
            total_pages,
            products_scraped: 0,
            total_products: 0,
            artifact_reference: None,
            error_detail: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Partial snapshot change. Only `Some` fields are applied on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub current_page: Option<u32>,
    pub products_scraped: Option<usize>,
    pub total_products: Option<usize>,
    pub artifact_reference: Option<String>,
    pub error_detail: Option<String>,
}

/// Broadcast on every accepted snapshot change.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub snapshot: JobSnapshot,
}
