//! Flipkart search-results profile

use std::time::Duration;

use url::Url;

use crate::error::HarvestError;
use crate::extract::{
    ExtractionProfile, FieldChains, Locator, Normalize, PriceRules, Read, Rule, SelectorChain,
    SponsorSignal, locators,
};
use crate::models::Platform;
use crate::normalize::CountKeywords;
use crate::pagination::PaginationStrategy;
use crate::readiness::{ReadinessProfile, WaitCondition};
use crate::tracker::ProgressPolicy;

use super::{ArtifactColumn, SiteProfile};

const BASE_URL: &str = "https://www.flipkart.com";

/// Builds the Flipkart profile: `data-id` identifiers and `page=` query
/// pagination. Grid and list layouts use different class names, so most
/// chains carry both.
pub fn profile() -> Result<SiteProfile, HarvestError> {
    let base_url = Url::parse(BASE_URL).map_err(|source| HarvestError::InvalidUrl {
        url: BASE_URL.to_string(),
        source,
    })?;

    let readiness_wait = Duration::from_secs(20);
    let conditions = ["div._1AtVbE", "div[data-id]", "a.s1Q9rs", "div._4rR01T"]
        .iter()
        .map(|css| WaitCondition::new(css, readiness_wait))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SiteProfile {
        platform: Platform::Flipkart,
        name: "Flipkart".to_string(),
        search_url_pattern: format!("{BASE_URL}/search?q={{query}}"),
        extraction: ExtractionProfile {
            base_url,
            containers: locators(&["div[data-id]"])?,
            identifier_attr: "data-id".to_string(),
            url_from_identifier: None,
            fields: fields()?,
        },
        readiness: ReadinessProfile {
            conditions,
            settle: Duration::from_secs(2),
        },
        pagination: PaginationStrategy::UrlParameter {
            key: "page".to_string(),
        },
        progress: ProgressPolicy::uncapped(),
        columns: vec![
            ArtifactColumn::Name,
            ArtifactColumn::Price,
            ArtifactColumn::Url,
            ArtifactColumn::Rating,
            ArtifactColumn::NumRatings,
            ArtifactColumn::Sponsored,
            ArtifactColumn::DeliveryDate,
            ArtifactColumn::UnitsSold,
        ],
    })
}

fn fields() -> Result<FieldChains, HarvestError> {
    let title = Read::AttrOrText("title".into());
    let name = SelectorChain::new(
        ["a.pIpigb", "a.s1Q9rs", "div._4rR01T", "a.IRpwTa"]
            .iter()
            .map(|css| -> Result<Rule, HarvestError> {
                Ok(Rule::at(css, Normalize::Text)?.reading(title.clone()))
            })
            .collect::<Result<Vec<_>, HarvestError>>()?,
    );

    let link = Normalize::Link {
        must_contain: Vec::new(),
    };
    let url = SelectorChain::new(
        ["a.pIpigb", "a.s1Q9rs", "a._1fQZEK", r#"a[href*="/p/itm"]"#]
            .iter()
            .map(|css| -> Result<Rule, HarvestError> {
                Ok(Rule::at(css, link.clone())?.reading(Read::Attr("href".into())))
            })
            .collect::<Result<Vec<_>, HarvestError>>()?,
    );

    let price = PriceRules {
        full: SelectorChain::new(vec![
            Rule::at("div.hZ3P6w", Normalize::Text)?,
            Rule::at("div._30jeq3", Normalize::Text)?,
        ]),
        whole: None,
        symbol: None,
        fraction: None,
        default_symbol: "₹".to_string(),
        default_fraction: "00".to_string(),
        fallback: SelectorChain::default(),
    };

    let rating = SelectorChain::new(vec![
        Rule::at("div.MKiFS6", Normalize::Rating)?,
        Rule::at("div._3LWZlK", Normalize::Rating)?,
    ]);

    let count = Normalize::Count {
        keywords: CountKeywords::Ratings,
        allow_bare: true,
    };
    let rating_count = SelectorChain::new(vec![
        Rule::at("span.PvbNMB", count.clone())?,
        Rule::at("span._2_R_DZ", count)?,
    ]);

    // Grid layouts rarely show either; the chains stay empty and yield the
    // unknown marker.
    let units_sold = SelectorChain::default();
    let delivery = SelectorChain::default();

    Ok(FieldChains {
        name,
        url,
        price,
        rating,
        rating_count,
        units_sold,
        delivery,
        sponsored: vec![
            SponsorSignal::TextContains("sponsored".into()),
            SponsorSignal::Badge(Locator::parse("div._2I5qvP")?),
            SponsorSignal::Badge(Locator::parse("span.y178-5")?),
        ],
    })
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;
    use crate::extract::extract_page;
    use crate::models::UNKNOWN;

    const GRID: &str = r#"
<html><body>
  <div data-id="MOBG1">
    <a class="pIpigb" title="Phone X (Midnight Black, 128 GB)" href="/phone-x/p/itm123?pid=MOBG1&lid=L1">Phone X (Midnight...</a>
    <div class="hZ3P6w">₹12,999</div>
    <div class="MKiFS6">4.4</div>
    <span class="PvbNMB">(36,417)</span>
  </div>
  <div data-id="MOBG2">
    <div class="_2I5qvP">Ad</div>
    <div class="_4rR01T">Phone Y</div>
  </div>
  <div data-id="MOBG3">
    <div class="_4rR01T">Phone Z</div>
    <a class="_1fQZEK" href="https://www.flipkart.com/phone-z/p/itm999">View</a>
    <div class="_3LWZlK">4.1 ★</div>
    <span class="_2_R_DZ">2,011 Ratings &amp; 150 Reviews</span>
  </div>
</body></html>"#;

    #[test]
    fn extracts_grid_layout_and_drops_linkless_candidates() {
        let profile = profile().unwrap();
        let page = extract_page(&Html::parse_document(GRID), &profile.extraction);

        assert_eq!(page.stats.nodes, 3);
        assert_eq!(page.stats.skipped_no_url, 1);
        assert_eq!(page.records.len(), 2);

        let x = &page.records[0];
        assert_eq!(x.identifier, "MOBG1");
        assert_eq!(x.name, "Phone X (Midnight Black, 128 GB)");
        assert_eq!(x.url, "https://www.flipkart.com/phone-x/p/itm123");
        assert_eq!(x.price, "₹12,999");
        assert_eq!(x.rating, "4.4");
        assert_eq!(x.rating_count, "36417");
        assert_eq!(x.units_sold, UNKNOWN);
        assert_eq!(x.delivery_estimate, UNKNOWN);
        assert!(!x.sponsored);

        let z = &page.records[1];
        assert_eq!(z.identifier, "MOBG3");
        assert_eq!(z.name, "Phone Z");
        assert_eq!(z.price, UNKNOWN);
        assert_eq!(z.rating, "4.1");
        assert_eq!(z.rating_count, "2011");
    }
}
