//! Resilient product-listing extraction across paginated search results.

pub mod artifact;
pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod listing_harvester;
pub mod models;
pub mod normalize;
pub mod pagination;
pub mod readiness;
pub mod scrapers;
pub mod tracker;
pub mod traits;

pub use error::{ConfigError, HarvestError, LookupError};
pub use listing_harvester::ListingHarvester;
pub use models::{JobId, JobSnapshot, JobStatus, Platform, ProductRecord, UNKNOWN};
