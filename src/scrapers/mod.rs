//! Site profiles: everything that differs between supported sites, as data.

pub mod amazon;
pub mod flipkart;

use std::time::Duration;

use crate::error::HarvestError;
use crate::extract::ExtractionProfile;
use crate::models::{Platform, ProductRecord};
use crate::pagination::PaginationStrategy;
use crate::readiness::ReadinessProfile;
use crate::tracker::ProgressPolicy;

/// Configuration for one supported site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub platform: Platform,
    /// Display name for the website
    pub name: String,
    /// Search URL pattern with {query} placeholder
    pub search_url_pattern: String,
    pub extraction: ExtractionProfile,
    pub readiness: ReadinessProfile,
    pub pagination: PaginationStrategy,
    pub progress: ProgressPolicy,
    /// Artifact columns in output order
    pub columns: Vec<ArtifactColumn>,
}

impl SiteProfile {
    /// Built-in profile for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidSelector`] if a built-in selector fails to parse.
    pub fn for_platform(platform: Platform) -> Result<Self, HarvestError> {
        match platform {
            Platform::Amazon => amazon::profile(),
            Platform::Flipkart => flipkart::profile(),
        }
    }

    /// Search URL for `search_term`, URL-encoded into the pattern.
    #[must_use]
    pub fn build_search_url(&self, search_term: &str) -> String {
        let encoded_term = urlencoding::encode(search_term);
        self.search_url_pattern.replace("{query}", &encoded_term)
    }

    /// Overrides every readiness wait and the settle delay, keeping the locators.
    #[must_use]
    pub fn with_readiness_timeouts(mut self, wait: Duration, settle: Duration) -> Self {
        for condition in &mut self.readiness.conditions {
            condition.timeout = wait;
        }
        self.readiness.settle = settle;
        self
    }
}

/// One column of the tabular artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactColumn {
    Name,
    Price,
    Url,
    Rating,
    NumRatings,
    Sponsored,
    DeliveryDate,
    UnitsSold,
}

impl ArtifactColumn {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Price => "Price",
            Self::Url => "URL",
            Self::Rating => "Rating",
            Self::NumRatings => "Number of Ratings",
            Self::Sponsored => "Sponsored",
            Self::DeliveryDate => "Delivery Date",
            Self::UnitsSold => "Units Sold",
        }
    }

    #[must_use]
    pub fn value(self, record: &ProductRecord) -> &str {
        match self {
            Self::Name => &record.name,
            Self::Price => &record.price,
            Self::Url => &record.url,
            Self::Rating => &record.rating,
            Self::NumRatings => &record.rating_count,
            Self::Sponsored => record.sponsored_label(),
            Self::DeliveryDate => &record.delivery_estimate,
            Self::UnitsSold => &record.units_sold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_profile_covers_the_full_column_set() {
        for platform in [Platform::Amazon, Platform::Flipkart] {
            let profile = SiteProfile::for_platform(platform).unwrap();
            let mut labels: Vec<&str> = profile.columns.iter().map(|c| c.label()).collect();
            labels.sort_unstable();
            assert_eq!(
                labels,
                vec![
                    "Delivery Date",
                    "Name",
                    "Number of Ratings",
                    "Price",
                    "Rating",
                    "Sponsored",
                    "URL",
                    "Units Sold"
                ]
            );
        }
    }

    #[test]
    fn search_url_encodes_the_term() {
        let profile = SiteProfile::for_platform(Platform::Amazon).unwrap();
        assert_eq!(
            profile.build_search_url("metal furniture"),
            "https://www.amazon.in/s?k=metal%20furniture"
        );
    }
}
