//! Amazon search-results profile

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

const BASE_URL: &str = "https://www.amazon.in";
const SPONSORED_RESULT: &str = r#"[data-component-type="sp-sponsored-result"]"#;

/// Builds the Amazon profile: `data-asin` identifiers, interactive "next"
/// pagination, and a progress scale that keeps the last 10% for persistence.
pub fn profile() -> Result<SiteProfile, HarvestError> {
    let base_url = Url::parse(BASE_URL).map_err(|source| HarvestError::InvalidUrl {
        url: BASE_URL.to_string(),
        source,
    })?;

    let extraction = ExtractionProfile {
        base_url,
        containers: locators(&[
            r#"[data-component-type="s-search-result"]"#,
            r#"[data-asin]:not([data-asin=""])"#,
        ])?,
        identifier_attr: "data-asin".to_string(),
        url_from_identifier: Some("/dp/{id}".to_string()),
        fields: fields()?,
    };

    Ok(SiteProfile {
        platform: Platform::Amazon,
        name: "Amazon".to_string(),
        search_url_pattern: format!("{BASE_URL}/s?k={{query}}"),
        extraction,
        readiness: ReadinessProfile {
            conditions: vec![
                WaitCondition::new(
                    r#"[data-component-type="s-search-result"]"#,
                    Duration::from_secs(30),
                )?,
                WaitCondition::new(
                    r#"[data-asin]:not([data-asin=""])"#,
                    Duration::from_secs(10),
                )?,
            ],
            settle: Duration::from_secs(3),
        },
        pagination: PaginationStrategy::NextControl {
            next_locators: locators(&[
                "a.s-pagination-next:not(.s-pagination-disabled)",
                "a.s-pagination-next",
                r#"[aria-label="Go to next page"]"#,
                r#"a[aria-label*="next"]"#,
            ])?,
            disabled_class: "s-pagination-disabled".to_string(),
        },
        progress: ProgressPolicy::reserve_for_persistence(),
        columns: vec![
            ArtifactColumn::Name,
            ArtifactColumn::Price,
            ArtifactColumn::Url,
            ArtifactColumn::DeliveryDate,
            ArtifactColumn::Sponsored,
            ArtifactColumn::Rating,
            ArtifactColumn::NumRatings,
            ArtifactColumn::UnitsSold,
        ],
    })
}

fn text_rules(css: &[&str], normalize: &Normalize) -> Result<Vec<Rule>, HarvestError> {
    css.iter().map(|s| Rule::at(s, normalize.clone())).collect()
}

fn fields() -> Result<FieldChains, HarvestError> {
    let name = SelectorChain::new(text_rules(
        &[
            "h2.a-size-mini a span",
            "h2 a span",
            "h2 a",
            "a.a-text-normal span",
            r#"[data-cy="title-recipe"] span"#,
            ".a-text-normal span",
            "h2 span",
            "h2",
        ],
        &Normalize::Text,
    )?);

    let product_link = Normalize::Link {
        must_contain: vec!["/dp/".into(), "/gp/product/".into()],
    };
    let url = SelectorChain::new(
        text_rules(
            &[
                "a.a-text-normal",
                "h2 a",
                r#"a[href*="/dp/"]"#,
                r#"a[href*="/gp/product/"]"#,
            ],
            &product_link,
        )?
        .into_iter()
        .map(|rule| rule.reading(Read::Attr("href".into())))
        .collect(),
    );

    let price = PriceRules {
        full: SelectorChain::new(vec![Rule::at(".a-price .a-offscreen", Normalize::Text)?]),
        whole: Some(Locator::parse(".a-price-whole")?),
        symbol: Some(Locator::parse(".a-price-symbol")?),
        fraction: Some(Locator::parse(".a-price-fraction")?),
        default_symbol: "₹".to_string(),
        default_fraction: "00".to_string(),
        fallback: SelectorChain::new(text_rules(
            &[
                r#"[data-a-color="price"] .a-offscreen"#,
                ".a-price",
                ".a-price-range",
                "span.a-price",
            ],
            &Normalize::Text,
        )?),
    };

    let rating = SelectorChain::new(
        text_rules(
            &[
                ".a-icon-alt",
                r#"[aria-label*="star"]"#,
                ".a-icon-star",
                "i.a-icon-star",
                "span.a-icon-alt",
            ],
            &Normalize::Rating,
        )?
        .into_iter()
        .map(|rule| rule.reading(Read::AttrOrText("aria-label".into())))
        .collect(),
    );

    let ratings_keyword_only = Normalize::Count {
        keywords: CountKeywords::Ratings,
        allow_bare: false,
    };
    let rating_count = SelectorChain::new(vec![
        Rule::at(
            r##"a[href*="#customerReviews"]"##,
            Normalize::Count {
                keywords: CountKeywords::Ratings,
                allow_bare: true,
            },
        )?,
        Rule::at(".a-row.a-size-small", ratings_keyword_only.clone())?,
        Rule::at(".a-size-base", ratings_keyword_only.clone())?,
        Rule::at("span.a-size-base, span.a-color-base", ratings_keyword_only)?.scanning(),
    ]);

    let sold_keyword_only = Normalize::Count {
        keywords: CountKeywords::UnitsSold,
        allow_bare: false,
    };
    let units_sold = SelectorChain::new(vec![
        Rule::at(
            r#"[data-testid="units-sold"]"#,
            Normalize::Count {
                keywords: CountKeywords::UnitsSold,
                allow_bare: true,
            },
        )?,
        Rule::at("span", sold_keyword_only.clone())?.scanning(),
        Rule::whole_node(sold_keyword_only),
    ]);

    let mut delivery_rules = text_rules(
        &[
            r#"[data-testid="delivery-date"]"#,
            ".a-color-base",
            ".a-text-bold",
            "span.a-color-base",
            ".s-align-children-center",
        ],
        &Normalize::Delivery,
    )?;
    delivery_rules.push(
        Rule::at("span, div, a", Normalize::Delivery)?
            .scanning()
            .max_len(100),
    );

    Ok(FieldChains {
        name,
        url,
        price,
        rating,
        rating_count,
        units_sold,
        delivery: SelectorChain::new(delivery_rules),
        sponsored: vec![
            SponsorSignal::AttrEquals {
                name: "data-component-type".into(),
                value: "sp-sponsored-result".into(),
            },
            SponsorSignal::Ancestor(Locator::parse(SPONSORED_RESULT)?),
            SponsorSignal::Badge(Locator::parse(".s-label-popover-default")?),
            SponsorSignal::TextContains("sponsored".into()),
        ],
    })
}
